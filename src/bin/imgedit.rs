//! imgedit - small still-image edits.
//!
//! Each subcommand reads its input image(s), applies one edit and writes one output
//! file. The output format follows the output file extension.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use haarwatch::imageops;

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(name = "imgedit", version, about = "Crop, resize, brighten, watermark or combine images")]
struct Cli {
    /// UI mode for stderr progress
    #[arg(long, global = true, value_enum, default_value_t = ui::UiMode::Auto)]
    ui: ui::UiMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cut out the box [left, right) x [top, bottom)
    Crop {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, allow_negative_numbers = true)]
        left: i64,
        #[arg(long, allow_negative_numbers = true)]
        top: i64,
        #[arg(long, allow_negative_numbers = true)]
        right: i64,
        #[arg(long, allow_negative_numbers = true)]
        bottom: i64,
    },
    /// Resample to an exact size
    Resize {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },
    /// Multiply color channels by a factor
    Brighten {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = 1.5)]
        factor: f32,
    },
    /// Stamp a 50x50 mark near the bottom-right corner
    Watermark {
        input: PathBuf,
        mark: PathBuf,
        output: PathBuf,
        /// Mark opacity in percent (0-100)
        #[arg(long, default_value_t = 50)]
        transparency: u8,
    },
    /// Place images side by side, left to right
    Combine {
        #[arg(long, short)]
        output: PathBuf,
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let ui = ui::Ui::new(cli.ui, std::io::stderr().is_terminal());

    let (edited, output) = match cli.command {
        Command::Crop {
            input,
            output,
            left,
            top,
            right,
            bottom,
        } => {
            let img = read(&ui, &input)?;
            let _stage = ui.stage("Crop");
            (imageops::crop(&img, left, top, right, bottom)?, output)
        }
        Command::Resize {
            input,
            output,
            width,
            height,
        } => {
            let img = read(&ui, &input)?;
            let _stage = ui.stage("Resize");
            (imageops::resize(&img, width, height)?, output)
        }
        Command::Brighten {
            input,
            output,
            factor,
        } => {
            let img = read(&ui, &input)?;
            let _stage = ui.stage("Brighten");
            (imageops::brighten(&img, factor)?, output)
        }
        Command::Watermark {
            input,
            mark,
            output,
            transparency,
        } => {
            let img = read(&ui, &input)?;
            let mark = read(&ui, &mark)?;
            let _stage = ui.stage("Watermark");
            (imageops::watermark(&img, &mark, transparency)?, output)
        }
        Command::Combine { output, inputs } => {
            let images = inputs
                .iter()
                .map(|path| read(&ui, path))
                .collect::<Result<Vec<_>>>()?;
            let _stage = ui.stage("Combine");
            (
                image::DynamicImage::ImageRgb8(imageops::combine_horizontal(&images)?),
                output,
            )
        }
    };

    {
        let mut stage = ui.stage("Write output");
        imageops::save(&edited, &output)?;
        stage.detail(format!(
            "{} ({}x{})",
            output.display(),
            edited.width(),
            edited.height()
        ));
    }
    log::info!("imgedit: wrote {}", output.display());
    Ok(())
}

fn read(ui: &ui::Ui, path: &Path) -> Result<image::DynamicImage> {
    let mut stage = ui.stage("Read image");
    let img = imageops::load(path)?;
    stage.detail(format!("{} ({}x{})", path.display(), img.width(), img.height()));
    Ok(img)
}
