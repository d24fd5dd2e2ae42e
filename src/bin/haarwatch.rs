//! haarwatch - Haar-cascade object detection over a video or a still image.
//!
//! `watch` runs the frame detection loop over a video until it ends, a frame fails to
//! decode, or the operator stops it (`q`/Esc in the window, Ctrl-C headless).
//! `still` runs the same pipeline over one image and optionally prints the detections
//! as JSON.

use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use image::Rgb;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use haarwatch::{
    CascadeClassifier, Classifier, DetectionLoop, Display, FileSource, HeadlessDisplay,
    Profile, StillImageSource, StopSignal, Termination, WatchConfig,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "haarwatch",
    version,
    about = "Detect objects in video frames with a Haar cascade and draw boxes around them"
)]
struct Cli {
    /// Config file (TOML, or JSON with a .json extension)
    #[arg(long, global = true, env = "HAARWATCH_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// UI mode for stderr progress
    #[arg(long, global = true, value_enum, default_value_t = ui::UiMode::Auto)]
    ui: ui::UiMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the detection loop over a video
    Watch(WatchArgs),
    /// Detect objects in a single image
    Still(StillArgs),
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Video path (`stub://N` for a synthetic N-frame sequence)
    #[arg(long, value_name = "PATH")]
    video: Option<String>,

    /// Exit non-zero when a frame fails to decode mid-stream
    #[arg(long)]
    strict_decode: bool,

    #[command(flatten)]
    detector: DetectorArgs,
}

#[derive(Args, Debug)]
struct StillArgs {
    /// Image to scan
    #[arg(long, value_name = "PATH")]
    image: PathBuf,

    /// Print detections as JSON on stdout
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    detector: DetectorArgs,
}

#[derive(Args, Debug)]
struct DetectorArgs {
    /// Cascade XML (defaults to the profile's cascade)
    #[arg(long, value_name = "PATH")]
    cascade: Option<PathBuf>,

    /// Cascade evaluator
    #[arg(long, value_enum, default_value_t = ClassifierKind::Native)]
    classifier: ClassifierKind,

    /// What to look for; selects the default cascade and box color
    #[arg(long, value_enum)]
    profile: Option<Profile>,

    /// Pyramid scale step (> 1)
    #[arg(long, value_name = "F")]
    scale_factor: Option<f64>,

    /// Raw hits needed before a detection is kept
    #[arg(long, value_name = "N")]
    min_neighbors: Option<u32>,

    /// Smallest object size considered
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    min_size: Option<(u32, u32)>,

    /// Largest object size considered
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    max_size: Option<(u32, u32)>,

    /// Box stroke width in pixels
    #[arg(long, value_name = "T")]
    thickness: Option<u32>,

    /// Box color
    #[arg(long, value_name = "R,G,B", value_parser = parse_color)]
    color: Option<Rgb<u8>>,

    /// Per-frame wait for operator input, in milliseconds
    #[arg(long, value_name = "MS")]
    wait_ms: Option<u64>,

    /// Where frames are rendered [default: window with the opencv feature, else headless]
    #[arg(long, value_enum)]
    display: Option<DisplayKind>,

    /// Headless only: write every annotated frame as PNG into this directory
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DisplayKind {
    Headless,
    Window,
}

impl DisplayKind {
    fn default_for_build() -> Self {
        if cfg!(feature = "opencv") {
            DisplayKind::Window
        } else {
            DisplayKind::Headless
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ClassifierKind {
    /// Built-in Haar evaluator
    Native,
    /// OpenCV objdetect (requires the opencv feature)
    Opencv,
}

impl DetectorArgs {
    fn apply(&self, cfg: &mut WatchConfig) -> Result<()> {
        if let Some(cascade) = &self.cascade {
            cfg.cascade = Some(cascade.clone());
        }
        if let Some(profile) = self.profile {
            cfg.profile = profile;
        }
        if let Some(factor) = self.scale_factor {
            cfg.scan.scale_factor = factor;
        }
        if let Some(neighbors) = self.min_neighbors {
            cfg.scan.min_neighbors = neighbors;
        }
        if self.min_size.is_some() {
            cfg.scan.min_size = self.min_size;
        }
        if self.max_size.is_some() {
            cfg.scan.max_size = self.max_size;
        }
        if let Some(thickness) = self.thickness {
            cfg.thickness = thickness;
        }
        if self.color.is_some() {
            cfg.color = self.color;
        }
        if let Some(ms) = self.wait_ms {
            cfg.wait = Duration::from_millis(ms);
        }
        cfg.validate()
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let ui = ui::Ui::new(cli.ui, std::io::stderr().is_terminal());
    let mut cfg = WatchConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Command::Watch(args) => run_watch(&ui, &mut cfg, args),
        Command::Still(args) => run_still(&ui, &mut cfg, args),
    }
}

fn run_watch(ui: &ui::Ui, cfg: &mut WatchConfig, args: WatchArgs) -> Result<()> {
    args.detector.apply(cfg)?;
    let video = args
        .video
        .or_else(|| cfg.video.clone())
        .ok_or_else(|| anyhow!("no video configured (use --video or HAARWATCH_VIDEO)"))?;

    let classifier = load_classifier(ui, cfg, args.detector.classifier)?;
    let source = FileSource::new(&video)?;
    let display = build_display(&args.detector, &format!("haarwatch: {}", video))?;

    let report = DetectionLoop::new(source, classifier, display)
        .with_style(cfg.style())
        .with_wait(cfg.wait)
        .run()?;

    println!(
        "{}: {} frames, {} detections ({})",
        video, report.frames, report.detections, report.termination
    );
    if let Termination::DecodeFailed(err) = &report.termination {
        if args.strict_decode {
            bail!("decoding {} failed: {}", video, err);
        }
    }
    Ok(())
}

fn run_still(ui: &ui::Ui, cfg: &mut WatchConfig, args: StillArgs) -> Result<()> {
    args.detector.apply(cfg)?;
    let classifier = load_classifier(ui, cfg, args.detector.classifier)?;
    let source = StillImageSource::new(&args.image);
    let display = build_display(&args.detector, &format!("haarwatch: {}", args.image.display()))?;

    let report = DetectionLoop::new(source, classifier, display)
        .with_style(cfg.style())
        .with_wait(cfg.wait.max(Duration::from_millis(30)))
        .hold_at_end(true)
        .run()?;

    if let Termination::DecodeFailed(err) = &report.termination {
        bail!("could not read {}: {}", args.image.display(), err);
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.last_detections)?);
    } else {
        println!(
            "{}: {} detections",
            args.image.display(),
            report.last_detections.len()
        );
    }
    Ok(())
}

fn load_classifier(
    ui: &ui::Ui,
    cfg: &WatchConfig,
    kind: ClassifierKind,
) -> Result<Box<dyn Classifier>> {
    let path = cfg.cascade_path();
    let mut stage = ui.stage("Load cascade");
    match kind {
        ClassifierKind::Native => {
            let classifier = CascadeClassifier::load(&path, cfg.scan.clone())?;
            stage.detail(cascade_summary(&path, &classifier));
            Ok(Box::new(classifier))
        }
        ClassifierKind::Opencv => {
            let classifier = opencv_classifier(&path, cfg)?;
            stage.detail(format!("{} (opencv)", path.display()));
            Ok(classifier)
        }
    }
}

#[cfg(feature = "opencv")]
fn opencv_classifier(path: &Path, cfg: &WatchConfig) -> Result<Box<dyn Classifier>> {
    Ok(Box::new(haarwatch::OpencvCascadeClassifier::load(
        path,
        cfg.scan.clone(),
    )?))
}

#[cfg(not(feature = "opencv"))]
fn opencv_classifier(_path: &Path, _cfg: &WatchConfig) -> Result<Box<dyn Classifier>> {
    bail!("--classifier opencv requires the opencv feature")
}

fn cascade_summary(path: &Path, classifier: &CascadeClassifier) -> String {
    let (w, h) = classifier.cascade().window_size();
    format!(
        "{} ({}x{}, {} stages)",
        path.display(),
        w,
        h,
        classifier.cascade().stage_count()
    )
}

fn build_display(args: &DetectorArgs, title: &str) -> Result<Box<dyn Display>> {
    let stop = StopSignal::new();
    stop.install_ctrlc()?;
    match args.display.unwrap_or_else(DisplayKind::default_for_build) {
        DisplayKind::Headless => {
            let mut display = HeadlessDisplay::new(stop);
            if let Some(dir) = &args.dump_dir {
                display = display.with_dump_dir(dir);
            }
            Ok(Box::new(display))
        }
        DisplayKind::Window => window_display(title, stop),
    }
}

#[cfg(feature = "opencv")]
fn window_display(title: &str, stop: StopSignal) -> Result<Box<dyn Display>> {
    Ok(Box::new(haarwatch::HighguiDisplay::new(title, stop)))
}

#[cfg(not(feature = "opencv"))]
fn window_display(_title: &str, _stop: StopSignal) -> Result<Box<dyn Display>> {
    bail!("--display window requires the opencv feature")
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{}'", value))?;
    let w = w.trim().parse().map_err(|_| format!("invalid width in '{}'", value))?;
    let h = h.trim().parse().map_err(|_| format!("invalid height in '{}'", value))?;
    Ok((w, h))
}

fn parse_color(value: &str) -> Result<Rgb<u8>, String> {
    let channels = value
        .split(',')
        .map(|c| c.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| format!("expected R,G,B with values 0-255, got '{}'", value))?;
    match channels.as_slice() {
        [r, g, b] => Ok(Rgb([*r, *g, *b])),
        _ => Err(format!("expected three channels, got '{}'", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_the_default_display_only_with_opencv() {
        let expected = if cfg!(feature = "opencv") {
            DisplayKind::Window
        } else {
            DisplayKind::Headless
        };
        assert_eq!(DisplayKind::default_for_build(), expected);

        let cli = Cli::try_parse_from(["haarwatch", "watch", "--video", "stub://3"])
            .expect("parse watch");
        let Command::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.detector.display, None);
        assert_eq!(args.detector.classifier, ClassifierKind::Native);
    }

    #[test]
    fn explicit_flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "haarwatch",
            "still",
            "--image",
            "cars.jpg",
            "--display",
            "headless",
            "--classifier",
            "opencv",
            "--min-size",
            "24x48",
            "--color",
            "0, 255, 0",
        ])
        .expect("parse still");
        let Command::Still(args) = cli.command else {
            panic!("expected still");
        };
        assert_eq!(args.detector.display, Some(DisplayKind::Headless));
        assert_eq!(args.detector.classifier, ClassifierKind::Opencv);
        assert_eq!(args.detector.min_size, Some((24, 48)));
        assert_eq!(args.detector.color, Some(Rgb([0, 255, 0])));
    }

    #[test]
    fn malformed_sizes_and_colors_are_rejected() {
        assert!(parse_size("24").is_err());
        assert!(parse_size("ax3").is_err());
        assert!(parse_color("1,2").is_err());
        assert!(parse_color("1,2,300").is_err());
    }
}
