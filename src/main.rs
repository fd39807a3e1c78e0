use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use topic_pdf::model::{Orientation, PageSize, RenderOptions};

/// Lay out a forum topic (JSON) as a paginated PDF
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Topic description (JSON)
    input: PathBuf,

    /// Output PDF (default: input with a .pdf extension)
    output: Option<PathBuf>,

    /// Render options (JSON); flags given here override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    page_size: Option<PageSizeArg>,

    #[arg(long)]
    landscape: bool,

    /// Left, right and top margin in mm
    #[arg(long)]
    margin: Option<f32>,

    /// Body font family
    #[arg(long)]
    font: Option<String>,

    /// Extra directory searched for TrueType fonts (repeatable)
    #[arg(long = "font-dir")]
    font_dirs: Vec<PathBuf>,

    /// Directory that local image references resolve against
    #[arg(long)]
    image_root: Option<PathBuf>,

    /// Board URL prefix that maps onto --image-root
    #[arg(long)]
    board_url: Option<String>,

    /// Directory for intermediate converted images
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Skip images hosted outside the board instead of downloading them
    #[arg(long)]
    no_remote_images: bool,

    /// Print the drawing calls instead of writing a PDF
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PageSizeArg {
    Letter,
    Legal,
    A3,
    A4,
    A5,
}

impl From<PageSizeArg> for PageSize {
    fn from(arg: PageSizeArg) -> Self {
        match arg {
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::Legal => PageSize::Legal,
            PageSizeArg::A3 => PageSize::A3,
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::A5 => PageSize::A5,
        }
    }
}

fn options_from(cli: &Cli) -> Result<RenderOptions, topic_pdf::Error> {
    let mut options = match &cli.config {
        Some(path) => topic_pdf::load_options(path)?,
        None => RenderOptions::default(),
    };
    if let Some(size) = cli.page_size {
        options.geometry.size = size.into();
    }
    if cli.landscape {
        options.geometry.orientation = Orientation::Landscape;
    }
    if let Some(margin) = cli.margin {
        options.geometry.width_margin = margin;
        options.geometry.height_margin = margin;
    }
    if let Some(font) = &cli.font {
        options.geometry.font_family = font.clone();
    }
    options.font_dirs.extend(cli.font_dirs.iter().cloned());
    if let Some(root) = &cli.image_root {
        options.image_root = root.clone();
    }
    if cli.board_url.is_some() {
        options.board_url = cli.board_url.clone();
    }
    if cli.cache_dir.is_some() {
        options.cache_dir = cli.cache_dir.clone();
    }
    if cli.no_remote_images {
        options.remote_images = false;
    }
    Ok(options)
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let options = match options_from(&cli) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.trace {
        return match topic_pdf::load_topic(&cli.input) {
            Ok(topic) => {
                let sink = topic_pdf::trace_topic(&topic, &options);
                for call in &sink.calls {
                    println!("{call}");
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let output = cli.output.clone().unwrap_or_else(|| cli.input.with_extension("pdf"));
    match topic_pdf::convert_topic_to_pdf(&cli.input, &output, &options) {
        Ok(()) => {
            println!("Converted {} -> {}", cli.input.display(), output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
