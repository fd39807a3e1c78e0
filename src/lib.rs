pub mod codec;
mod error;
mod fonts;
pub mod images;
pub mod interpret;
pub mod layout;
pub mod loader;
pub mod markup;
pub mod model;
pub mod pdf;
pub mod sink;
pub mod style;
pub mod topic;

pub use error::Error;

use std::path::Path;
use std::time::Instant;

use codec::RasterCodec;
use loader::{LocalImageLoader, RemoteFetcher};
use model::{RenderOptions, Topic};
use pdf::{DocumentInfo, PdfSink};
use sink::RecordingSink;

/// Reads a topic description (JSON) from disk.
pub fn load_topic(path: &Path) -> Result<Topic, Error> {
    let data = std::fs::read(path)?;
    parse_topic(&data)
}

pub fn parse_topic(data: &[u8]) -> Result<Topic, Error> {
    let topic: Topic = serde_json::from_slice(data)?;
    if topic.posts.is_empty() {
        return Err(Error::InvalidTopic("topic has no posts".to_string()));
    }
    Ok(topic)
}

/// Reads render options (JSON). Missing fields take their defaults.
pub fn load_options(path: &Path) -> Result<RenderOptions, Error> {
    let data = std::fs::read(path)?;
    serde_json::from_slice(&data).map_err(|e| Error::InvalidOptions(e.to_string()))
}

fn image_loader(options: &RenderOptions) -> LocalImageLoader {
    let loader = LocalImageLoader::new(options.image_root.clone(), options.board_url.clone());
    match options.remote_images.then(|| RemoteFetcher::new(options.max_remote_bytes)).flatten() {
        Some(fetcher) => loader.with_remote(fetcher),
        None => loader,
    }
}

fn document_info(topic: &Topic) -> DocumentInfo {
    DocumentInfo {
        title: format!("{}_{}", topic.forum_name, topic.board_name),
        author: topic.forum_name.clone(),
        subject: markup::decode_entities(&topic.subject),
    }
}

/// Lays out `topic` and returns the PDF bytes.
pub fn render_topic_pdf(topic: &Topic, options: &RenderOptions) -> Result<Vec<u8>, Error> {
    let loader = image_loader(options);
    let codec = RasterCodec::new(options.cache_dir.clone());
    let sink = PdfSink::new(&options.geometry, &options.font_dirs, document_info(topic));
    let sink = topic::render_topic(sink, topic, options, &loader, &codec);
    sink.finish()
}

/// Lays out `topic` against a `RecordingSink`, for inspecting placement
/// without producing a PDF.
pub fn trace_topic(topic: &Topic, options: &RenderOptions) -> RecordingSink {
    let loader = image_loader(options);
    let codec = RasterCodec::new(options.cache_dir.clone());
    topic::render_topic(RecordingSink::new(), topic, options, &loader, &codec)
}

pub fn convert_topic_to_pdf(input: &Path, output: &Path, options: &RenderOptions) -> Result<(), Error> {
    let t0 = Instant::now();

    let topic = load_topic(input)?;
    let t_parse = t0.elapsed();

    let bytes = render_topic_pdf(&topic, options)?;
    let t_render = t0.elapsed();

    std::fs::write(output, &bytes).map_err(Error::Io)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, render={:.1}ms, write={:.1}ms, total={:.1}ms ({} posts, output {} bytes)",
        t_parse.as_secs_f64() * 1000.0,
        (t_render - t_parse).as_secs_f64() * 1000.0,
        (t_total - t_render).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        topic.posts.len(),
        bytes.len(),
    );

    Ok(())
}
