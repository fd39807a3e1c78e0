use std::path::PathBuf;

use serde::Deserialize;

pub type Rgb = [u8; 3];

/// Image encodings the rendering sink can place directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Topic {
    /// Forum name, used in the footer and document metadata.
    pub forum_name: String,
    pub category_name: String,
    #[serde(default)]
    pub parent_boards: Vec<String>,
    pub board_name: String,
    pub subject: String,
    pub poster_name: String,
    pub post_time: String,
    pub topic_url: String,
    #[serde(default)]
    pub poll: Option<Poll>,
    pub posts: Vec<Post>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Post {
    pub id: u32,
    pub subject: String,
    pub author: String,
    pub time: String,
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// One image attached to a post. `width`/`height` are pixels as recorded
/// at upload time; `file` is a reference the image loader understands.
#[derive(Clone, Debug, Deserialize)]
pub struct Attachment {
    pub id: u32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub mime_type: String,
    pub file: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Poll {
    pub question: String,
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub show_votes: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PollOption {
    pub label: String,
    #[serde(default)]
    pub votes: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    Letter,
    Legal,
    A3,
    A4,
    A5,
    /// Portrait width and height in mm.
    Custom { width: f32, height: f32 },
}

impl PageSize {
    /// Portrait (width, height) in mm.
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
            PageSize::A3 => (297.0, 420.0),
            PageSize::A4 => (210.0, 297.0),
            PageSize::A5 => (148.0, 210.0),
            PageSize::Custom { width, height } => (width, height),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Page setup. All lengths are millimetres.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub size: PageSize,
    pub orientation: Orientation,
    /// Left and right margin.
    pub width_margin: f32,
    /// Top margin.
    pub height_margin: f32,
    /// Distance from the bottom edge at which content breaks to a new page.
    pub break_margin: f32,
    pub font_family: String,
    pub font_size: f32,
    pub mono_family: String,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            size: PageSize::Letter,
            orientation: Orientation::Portrait,
            width_margin: 15.0,
            height_margin: 15.0,
            break_margin: 28.35 / (72.0 / 25.4), // 1 cm
            font_family: "OpenSans".to_string(),
            font_size: 10.0,
            mono_family: "DejaVu Sans Mono".to_string(),
        }
    }
}

impl PageGeometry {
    pub fn page_dimensions(&self) -> (f32, f32) {
        let (w, h) = self.size.dimensions_mm();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

/// Fixed strings printed around the post bodies.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub title: String,
    pub posted_by: String,
    pub on: String,
    pub page: String,
    pub topic: String,
    pub link: String,
    pub topic_started: String,
    pub poll_question: String,
    pub option: String,
    pub votes: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            title: "Title".to_string(),
            posted_by: "Post by".to_string(),
            on: "on".to_string(),
            page: "Page".to_string(),
            topic: "Topic".to_string(),
            link: "link".to_string(),
            topic_started: "Topic started by".to_string(),
            poll_question: "Question".to_string(),
            option: "Option".to_string(),
            votes: "Votes".to_string(),
        }
    }
}

/// Everything besides the topic itself that shapes one conversion. Read from
/// an options JSON file with [`crate::load_options`]; every field is optional.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub geometry: PageGeometry,
    pub labels: Labels,
    /// Extra directories searched for TrueType fonts before the system ones.
    pub font_dirs: Vec<PathBuf>,
    /// Directory local image references resolve against.
    pub image_root: PathBuf,
    /// Absolute URL prefix that maps onto `image_root`.
    pub board_url: Option<String>,
    /// Where converted/repaired images are written while they are placed.
    pub cache_dir: Option<PathBuf>,
    /// Download images referenced by HTTP(S) URLs outside the board.
    pub remote_images: bool,
    pub max_remote_bytes: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            labels: Labels::default(),
            font_dirs: Vec::new(),
            image_root: PathBuf::new(),
            board_url: None,
            cache_dir: None,
            remote_images: true,
            max_remote_bytes: crate::loader::MAX_REMOTE_BYTES,
        }
    }
}
