use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::images::ImageKind;

/// Fetched image bytes plus what could be read from their header.
#[derive(Clone, Debug)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// `None` when the bytes are not a format we recognise.
    pub kind: Option<ImageKind>,
}

pub trait ImageLoader {
    /// Returns `None` when the reference cannot be resolved or read.
    fn fetch(&self, reference: &str) -> Option<LoadedImage>;
}

/// Sniffs kind and pixel size from encoded bytes.
pub fn probe(bytes: Vec<u8>) -> Option<LoadedImage> {
    let kind = ImageKind::sniff(&bytes);
    let (width, height) = image::ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some(LoadedImage {
        bytes,
        width,
        height,
        kind,
    })
}

/// Default cap on a downloaded image, in bytes.
pub const MAX_REMOTE_BYTES: u64 = 8 * 1024 * 1024;
const REMOTE_TIMEOUT: Duration = Duration::from_secs(15);

/// Single-shot HTTP(S) download of remote images, refused above `max_bytes`.
#[derive(Clone, Debug)]
pub struct RemoteFetcher {
    client: reqwest::blocking::Client,
    max_bytes: u64,
}

impl RemoteFetcher {
    pub fn new(max_bytes: u64) -> Option<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REMOTE_TIMEOUT)
            .user_agent(concat!("topic-pdf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| log::warn!("remote image fetching disabled: {e}"))
            .ok()?;
        Some(Self { client, max_bytes })
    }

    pub fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        let t0 = std::time::Instant::now();
        let response = match self.client.get(url).send().and_then(|r| r.error_for_status()) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("remote image {url} not fetched: {e}");
                return None;
            }
        };
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            log::warn!("remote image {url} exceeds {} bytes", self.max_bytes);
            return None;
        }

        let mut bytes = Vec::new();
        if let Err(e) = response.take(self.max_bytes + 1).read_to_end(&mut bytes) {
            log::warn!("remote image {url} read failed: {e}");
            return None;
        }
        if bytes.len() as u64 > self.max_bytes {
            log::warn!("remote image {url} exceeds {} bytes", self.max_bytes);
            return None;
        }
        log::debug!(
            "fetched {url}: {} bytes in {:.1}ms",
            bytes.len(),
            t0.elapsed().as_secs_f64() * 1000.0
        );
        Some(bytes)
    }
}

enum Source {
    Local(PathBuf),
    Remote(String),
}

fn is_http(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Loads images from a directory tree. Absolute references under the board
/// URL map onto that directory; other HTTP(S) URLs go to the remote fetcher
/// when one is configured.
#[derive(Clone, Debug)]
pub struct LocalImageLoader {
    root: PathBuf,
    board_url: Option<String>,
    remote: Option<RemoteFetcher>,
}

impl LocalImageLoader {
    pub fn new(root: PathBuf, board_url: Option<String>) -> Self {
        Self {
            root,
            board_url,
            remote: None,
        }
    }

    pub fn with_remote(mut self, fetcher: RemoteFetcher) -> Self {
        self.remote = Some(fetcher);
        self
    }

    fn resolve(&self, reference: &str) -> Option<Source> {
        let relative = match &self.board_url {
            Some(base) if !base.is_empty() && reference.starts_with(base.as_str()) => {
                &reference[base.len()..]
            }
            _ if is_http(reference) => return Some(Source::Remote(reference.trim().to_string())),
            _ if reference.contains("://") => {
                log::debug!("unsupported image scheme: {reference}");
                return None;
            }
            _ => reference,
        };

        let relative = Path::new(relative.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            log::warn!("image reference escapes the image root: {reference}");
            return None;
        }
        Some(Source::Local(self.root.join(relative)))
    }
}

impl ImageLoader for LocalImageLoader {
    fn fetch(&self, reference: &str) -> Option<LoadedImage> {
        let bytes = match self.resolve(reference)? {
            Source::Local(path) => match std::fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    log::debug!("image {} unavailable: {e}", path.display());
                    return None;
                }
            },
            Source::Remote(url) => match &self.remote {
                Some(fetcher) => fetcher.fetch(&url)?,
                None => {
                    log::debug!("remote image not fetched: {url}");
                    return None;
                }
            },
        };
        let loaded = probe(bytes);
        if loaded.is_none() {
            log::debug!("image {reference} has an unreadable header");
        }
        loaded
    }
}
