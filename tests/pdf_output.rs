mod common;

use std::io::Cursor;
use std::path::Path;

use common::{attachment, post, topic};
use topic_pdf::model::{PageGeometry, PageSize, RenderOptions, Topic};
use topic_pdf::{
    Error, convert_topic_to_pdf, load_options, load_topic, parse_topic, render_topic_pdf, trace_topic,
};

/// Options that never match an installed font, so text is set in the
/// builtin Helvetica and shows up as plain WinAnsi strings.
fn options(image_root: &Path) -> RenderOptions {
    RenderOptions {
        geometry: PageGeometry {
            font_family: "NoSuchFont".to_string(),
            mono_family: "NoSuchMono".to_string(),
            ..PageGeometry::default()
        },
        image_root: image_root.to_path_buf(),
        ..Default::default()
    }
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
}

/// Inflates every Flate stream in the file that decodes cleanly.
fn inflated_streams(pdf: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(start) = find(pdf, b"stream\n", pos) {
        pos = start + 7;
        if start >= 3 && &pdf[start - 3..start] == b"end" {
            continue;
        }
        let Some(end) = find(pdf, b"\nendstream", pos) else {
            break;
        };
        if let Ok(data) = miniz_oxide::inflate::decompress_to_vec_zlib(&pdf[pos..end]) {
            out.push(data);
        }
        pos = end;
    }
    out
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn long_topic() -> Topic {
    let body = (0..150).map(|n| format!("line {n}<br>")).collect::<String>();
    topic(vec![post(1, &body, vec![])])
}

#[test]
fn produces_a_pdf_with_metadata_and_links() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    let bytes = render_topic_pdf(&topic(vec![post(1, "Hello forum", vec![])]), &options(dir.path())).unwrap();

    assert!(bytes.starts_with(b"%PDF-"));
    assert!(contains(&bytes, "Tinkerers_Lathes"));
    assert!(contains(&bytes, "/Annots"));
    assert!(contains(&bytes, "/URI"));
    assert!(contains(&bytes, "https://forum.example/index.php?topic=42.0"));
    assert!(contains(&bytes, "/Helvetica"));
}

#[test]
fn page_count_matches_the_layout_trace() {
    let dir = tempfile::tempdir().unwrap();
    let topic = long_topic();
    let opts = options(dir.path());

    let pages = trace_topic(&topic, &opts).pages().len();
    assert!(pages >= 3);
    let bytes = render_topic_pdf(&topic, &opts).unwrap();
    assert!(contains(&bytes, &format!("/Count {pages}")));
}

#[test]
fn page_total_alias_is_filled_in() {
    let dir = tempfile::tempdir().unwrap();
    let topic = long_topic();
    let opts = options(dir.path());
    let pages = trace_topic(&topic, &opts).pages().len();
    let bytes = render_topic_pdf(&topic, &opts).unwrap();

    let streams = inflated_streams(&bytes);
    assert!(!streams.is_empty());
    assert!(streams.iter().any(|s| contains(s, &format!("Page 1 / {pages}"))));
    assert!(streams.iter().any(|s| contains(s, &format!("Page {pages} / {pages}"))));
    assert!(!streams.iter().any(|s| contains(s, "{nb}")));
}

#[test]
fn page_total_alias_in_post_text_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let topic = topic(vec![post(1, "budget {nb} left", vec![])]);
    let bytes = render_topic_pdf(&topic, &options(dir.path())).unwrap();

    let streams = inflated_streams(&bytes);
    assert!(streams.iter().any(|s| contains(s, "Page 1 / 1")));
    assert!(streams.iter().any(|s| contains(s, "{nb}")));
}

#[test]
fn options_file_overrides_only_the_fields_it_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.json");
    std::fs::write(
        &path,
        r#"{
            "geometry": {"size": "a4", "orientation": "landscape", "width_margin": 20.0},
            "board_url": "https://forum.example/",
            "remote_images": false
        }"#,
    )
    .unwrap();

    let opts = load_options(&path).unwrap();
    let defaults = RenderOptions::default();
    assert_eq!(opts.geometry.size, PageSize::A4);
    assert_eq!(opts.geometry.width_margin, 20.0);
    assert_eq!(opts.geometry.font_size, defaults.geometry.font_size);
    assert_eq!(opts.board_url.as_deref(), Some("https://forum.example/"));
    assert!(!opts.remote_images);
    assert_eq!(opts.max_remote_bytes, defaults.max_remote_bytes);
}

#[test]
fn malformed_options_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.json");
    std::fs::write(&path, r#"{"geometry": {"size": "tabloid"}}"#).unwrap();
    assert!(matches!(load_options(&path), Err(Error::InvalidOptions(_))));
    assert!(matches!(load_options(&dir.path().join("absent.json")), Err(Error::Io(_))));
}

#[test]
fn transparent_png_gets_a_soft_mask_and_jpeg_passes_through() {
    let dir = tempfile::tempdir().unwrap();
    let rgba = image::RgbaImage::from_fn(8, 8, |x, _| image::Rgba([200, 10, 10, (x * 30) as u8]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(dir.path().join("alpha.png"), png).unwrap();
    std::fs::write(dir.path().join("photo.jpg"), common::encode(8, 8, image::ImageFormat::Jpeg)).unwrap();

    let attachments = vec![
        attachment(1, "alpha.png", "image/png", 8, 8),
        attachment(2, "photo.jpg", "image/jpeg", 8, 8),
    ];
    let bytes = render_topic_pdf(&topic(vec![post(1, "pics", attachments)]), &options(dir.path())).unwrap();

    assert!(contains(&bytes, "/SMask"));
    assert!(contains(&bytes, "/DCTDecode"));
    assert!(contains(&bytes, "/Im2"));
}

#[test]
fn convert_writes_the_output_file() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("topic.json");
    let output = dir.path().join("topic.pdf");
    std::fs::write(
        &input,
        r#"{
            "forum_name": "Tinkerers",
            "category_name": "Workshop",
            "board_name": "Lathes",
            "subject": "Chucks",
            "poster_name": "Alice",
            "post_time": "today",
            "topic_url": "https://forum.example/t/1",
            "posts": [
                {"id": 1, "subject": "Chucks", "author": "Alice", "time": "today", "body": "<b>Hi</b> there"}
            ]
        }"#,
    )
    .unwrap();

    convert_topic_to_pdf(&input, &output, &options(dir.path())).unwrap();
    let written = std::fs::read(&output).unwrap();
    assert!(written.starts_with(b"%PDF-"));
}

#[test]
fn topic_without_posts_is_rejected() {
    let json = br#"{"forum_name": "F", "category_name": "C", "board_name": "B", "subject": "S",
        "poster_name": "P", "post_time": "T", "topic_url": "U", "posts": []}"#;
    assert!(matches!(parse_topic(json), Err(Error::InvalidTopic(_))));
}

#[test]
fn attachment_fields_beyond_the_model_are_ignored() {
    let json = br#"{"forum_name": "F", "category_name": "C", "board_name": "B", "subject": "S",
        "poster_name": "P", "post_time": "T", "topic_url": "U",
        "posts": [{"id": 1, "subject": "S", "author": "A", "time": "T", "body": "x",
            "attachments": [{"id": 3, "mime_type": "image/png", "file": "a.png", "content_hash": "d41d8c"}]}]}"#;
    let topic = parse_topic(json).unwrap();
    assert_eq!(topic.posts[0].attachments[0].file, "a.png");
}

#[test]
fn malformed_topic_is_rejected() {
    assert!(matches!(parse_topic(b"{ not json"), Err(Error::InvalidTopic(_))));
    assert!(matches!(parse_topic(br#"{"forum_name": 3}"#), Err(Error::InvalidTopic(_))));
}

#[test]
fn missing_topic_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(load_topic(&dir.path().join("absent.json")), Err(Error::Io(_))));
}
