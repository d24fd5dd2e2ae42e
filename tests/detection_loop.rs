use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use haarwatch::{
    BoxStyle, ColorFrame, Detection, DetectionLoop, Display, FixedClassifier, FrameSource,
    LoopError, SourceStats, Termination,
};

const BG: Rgb<u8> = Rgb([40, 80, 120]);
const WIDTH: u32 = 24;
const HEIGHT: u32 = 16;

fn frame(index: u64) -> ColorFrame {
    ColorFrame::new(RgbImage::from_pixel(WIDTH, HEIGHT, BG), index)
}

/// Source that replays a script of frames and read failures.
#[derive(Default)]
struct ScriptedSource {
    script: VecDeque<std::result::Result<ColorFrame, String>>,
    fail_connect: bool,
    connects: usize,
    reads: usize,
    releases: usize,
}

impl ScriptedSource {
    fn frames(n: u64) -> Self {
        Self {
            script: (0..n).map(|i| Ok(frame(i))).collect(),
            ..Self::default()
        }
    }

    fn then_fail(mut self, message: &str) -> Self {
        self.script.push_back(Err(message.to_string()));
        self
    }
}

impl FrameSource for ScriptedSource {
    fn connect(&mut self) -> Result<()> {
        self.connects += 1;
        if self.fail_connect {
            return Err(anyhow!("no such file: missing.avi"));
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<ColorFrame>> {
        self.reads += 1;
        match self.script.pop_front() {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.releases += 1;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.reads as u64,
            path: "scripted".to_string(),
        }
    }
}

/// Display that records every rendered frame.
#[derive(Default)]
struct RecordingDisplay {
    shown: Vec<ColorFrame>,
    opens: usize,
    closes: usize,
    waits: usize,
    /// Request a stop on this (1-based) wait.
    stop_on_wait: Option<usize>,
    fail_open: bool,
    fail_show_at: Option<usize>,
    interactive: bool,
}

impl Display for RecordingDisplay {
    fn open(&mut self) -> Result<()> {
        self.opens += 1;
        if self.fail_open {
            return Err(anyhow!("cannot open display"));
        }
        Ok(())
    }

    fn show(&mut self, frame: &ColorFrame) -> Result<()> {
        if self.fail_show_at == Some(self.shown.len()) {
            return Err(anyhow!("window vanished"));
        }
        self.shown.push(frame.clone());
        Ok(())
    }

    fn wait_for_stop(&mut self, _wait: Duration) -> Result<bool> {
        self.waits += 1;
        Ok(self.stop_on_wait == Some(self.waits))
    }

    fn close(&mut self) {
        self.closes += 1;
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

fn in_band(x: i32, y: i32, d: &Detection, thickness: i32) -> bool {
    let inside = x >= d.x && x <= d.right() && y >= d.y && y <= d.bottom();
    let edge = (x - d.x).min(d.right() - x).min(y - d.y).min(d.bottom() - y);
    inside && edge < thickness
}

#[test]
fn finite_source_ends_after_last_frame() {
    let mut source = ScriptedSource::frames(3);
    let mut display = RecordingDisplay::default();

    let report = DetectionLoop::new(&mut source, FixedClassifier::empty(), &mut display)
        .run()
        .expect("loop runs");

    assert_eq!(report.termination, Termination::EndOfStream);
    assert_eq!(report.frames, 3);
    assert_eq!(source.connects, 1);
    assert_eq!(source.reads, 4);
    assert_eq!(source.releases, 1);
    assert_eq!((display.opens, display.closes), (1, 1));
    assert_eq!(display.shown.len(), 3);
}

#[test]
fn fixed_rectangle_paints_exactly_its_border() {
    let det = Detection::new(4, 3, 10, 8);
    let style = BoxStyle::new(Rgb([255, 0, 0]), 2);
    let mut source = ScriptedSource::frames(1);
    let mut display = RecordingDisplay::default();

    DetectionLoop::new(&mut source, FixedClassifier::always(vec![det]), &mut display)
        .with_style(style)
        .run()
        .expect("loop runs");

    let rendered = display.shown[0].image();
    for (x, y, px) in rendered.enumerate_pixels() {
        let expected = if in_band(x as i32, y as i32, &det, 2) {
            style.color
        } else {
            BG
        };
        assert_eq!(*px, expected, "pixel ({}, {})", x, y);
    }
}

#[test]
fn zero_detections_render_the_source_frame_unchanged() {
    let mut source = ScriptedSource::frames(2);
    let mut display = RecordingDisplay::default();

    DetectionLoop::new(&mut source, FixedClassifier::empty(), &mut display)
        .run()
        .expect("loop runs");

    for (i, shown) in display.shown.iter().enumerate() {
        assert_eq!(shown, &frame(i as u64));
    }
}

#[test]
fn source_open_failure_touches_nothing() {
    let mut source = ScriptedSource {
        fail_connect: true,
        ..ScriptedSource::frames(5)
    };
    let mut display = RecordingDisplay::default();

    let err = DetectionLoop::new(&mut source, FixedClassifier::empty(), &mut display)
        .run()
        .expect_err("connect fails");

    assert!(matches!(err, LoopError::SourceOpen(_)));
    assert!(err.to_string().contains("missing.avi"));
    assert_eq!(source.reads, 0);
    assert_eq!(source.releases, 0);
    assert_eq!((display.opens, display.closes), (0, 0));
    assert!(display.shown.is_empty());
}

#[test]
fn per_frame_detections_render_in_order() {
    let n = 5;
    let mut classifier = FixedClassifier::empty();
    for i in 0..n {
        classifier = classifier.with_frame(i, vec![Detection::new(i as i32 * 3, 1, 2, 2)]);
    }
    let style = BoxStyle::new(Rgb([0, 255, 0]), 1);
    let mut source = ScriptedSource::frames(n);
    let mut display = RecordingDisplay::default();

    let report = DetectionLoop::new(&mut source, classifier, &mut display)
        .with_style(style)
        .run()
        .expect("loop runs");

    assert_eq!(report.frames, n);
    assert_eq!(report.detections, n);
    assert_eq!(display.shown.len(), n as usize);
    for (i, shown) in display.shown.iter().enumerate() {
        assert_eq!(shown.index, i as u64);
        let own_x = i as u32 * 3;
        assert_eq!(*shown.image().get_pixel(own_x, 1), style.color);
        // another frame's box position stays background
        let other_x = ((i as u32 + 1) % n as u32) * 3;
        assert_eq!(*shown.image().get_pixel(other_x, 1), BG);
    }
}

#[test]
fn decode_failure_terminates_and_releases_once() {
    let mut source = ScriptedSource::frames(2).then_fail("corrupt packet");
    let mut display = RecordingDisplay::default();

    let report = DetectionLoop::new(&mut source, FixedClassifier::empty(), &mut display)
        .run()
        .expect("decode failure is not an error");

    assert_eq!(
        report.termination,
        Termination::DecodeFailed("corrupt packet".to_string())
    );
    assert_eq!(report.frames, 2);
    assert_eq!(source.releases, 1);
    assert_eq!(display.closes, 1);
}

#[test]
fn operator_stop_terminates_and_releases_once() {
    let mut source = ScriptedSource::frames(10);
    let mut display = RecordingDisplay {
        stop_on_wait: Some(2),
        ..RecordingDisplay::default()
    };

    let report = DetectionLoop::new(&mut source, FixedClassifier::empty(), &mut display)
        .run()
        .expect("loop runs");

    assert_eq!(report.termination, Termination::OperatorStop);
    assert_eq!(report.frames, 2);
    assert_eq!(source.reads, 2);
    assert_eq!(source.releases, 1);
    assert_eq!(display.closes, 1);
}

#[test]
fn display_open_failure_releases_source() {
    let mut source = ScriptedSource::frames(3);
    let mut display = RecordingDisplay {
        fail_open: true,
        ..RecordingDisplay::default()
    };

    let err = DetectionLoop::new(&mut source, FixedClassifier::empty(), &mut display)
        .run()
        .expect_err("display fails");

    assert!(matches!(err, LoopError::Display(_)));
    assert_eq!(source.reads, 0);
    assert_eq!(source.releases, 1);
}

#[test]
fn render_failure_still_releases_and_closes() {
    let mut source = ScriptedSource::frames(4);
    let mut display = RecordingDisplay {
        fail_show_at: Some(1),
        ..RecordingDisplay::default()
    };

    let err = DetectionLoop::new(&mut source, FixedClassifier::empty(), &mut display)
        .run()
        .expect_err("render fails");

    assert!(matches!(err, LoopError::Display(_)));
    assert_eq!(source.releases, 1);
    assert_eq!(display.closes, 1);
    assert_eq!(display.shown.len(), 1);
}

#[test]
fn interactive_hold_waits_for_operator_after_end_of_stream() {
    let mut source = ScriptedSource::frames(1);
    let mut display = RecordingDisplay {
        interactive: true,
        stop_on_wait: Some(4),
        ..RecordingDisplay::default()
    };

    let report = DetectionLoop::new(&mut source, FixedClassifier::empty(), &mut display)
        .hold_at_end(true)
        .run()
        .expect("loop runs");

    assert_eq!(report.termination, Termination::EndOfStream);
    // one wait after the frame, then three while holding
    assert_eq!(display.waits, 4);
    assert_eq!(source.releases, 1);
    assert_eq!(display.closes, 1);
}
