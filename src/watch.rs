//! Frame detection loop.
//!
//! Pulls frames from a [`FrameSource`] one at a time, converts each to grayscale, runs a
//! [`Classifier`] on it, outlines every detection on the color frame and renders it on
//! a [`Display`], then yields to the display for a stop request. The loop is a two-state
//! machine:
//!
//! ```text
//! Running --(end of stream | decode failure | operator stop)--> Terminated
//! ```
//!
//! After a successful `connect` the source is released exactly once and the display
//! closed exactly once, whichever way the loop ends.

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::Context;
use thiserror::Error;

use crate::annotate::{draw_detections, BoxStyle};
use crate::detect::{Classifier, Detection};
use crate::display::Display;
use crate::source::FrameSource;

/// Frames between periodic progress lines.
const PROGRESS_EVERY: u64 = 300;
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Why the loop stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The source ran out of frames.
    EndOfStream,
    /// A frame could not be read or decoded; carries the error text.
    DecodeFailed(String),
    /// The operator asked to stop.
    OperatorStop,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::EndOfStream => f.write_str("end of stream"),
            Termination::DecodeFailed(err) => write!(f, "decode failure ({})", err),
            Termination::OperatorStop => f.write_str("operator stop"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminated(Termination),
}

/// Summary of a finished run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopReport {
    /// Frames rendered.
    pub frames: u64,
    /// Detections drawn across all frames.
    pub detections: u64,
    /// Detections of the last rendered frame.
    pub last_detections: Vec<Detection>,
    pub termination: Termination,
}

/// Errors that abort the loop. Stream exhaustion and decode failures are not errors;
/// they end the loop through [`Termination`].
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("failed to open video source: {0:#}")]
    SourceOpen(anyhow::Error),
    #[error("display failed: {0:#}")]
    Display(anyhow::Error),
}

pub struct DetectionLoop<S, C, D> {
    source: S,
    classifier: C,
    display: D,
    style: BoxStyle,
    wait: Duration,
    hold_at_end: bool,
    frames: u64,
    detections: u64,
    last_detections: Vec<Detection>,
    classify_time: Duration,
}

impl<S, C, D> DetectionLoop<S, C, D>
where
    S: FrameSource,
    C: Classifier,
    D: Display,
{
    pub fn new(source: S, classifier: C, display: D) -> Self {
        Self {
            source,
            classifier,
            display,
            style: BoxStyle::default(),
            wait: MIN_WAIT,
            hold_at_end: false,
            frames: 0,
            detections: 0,
            last_detections: Vec::new(),
            classify_time: Duration::ZERO,
        }
    }

    pub fn with_style(mut self, style: BoxStyle) -> Self {
        self.style = style;
        self
    }

    /// Per-frame yield to the display. Never shorter than 1 ms.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait.max(MIN_WAIT);
        self
    }

    /// On an interactive display, keep the last frame up after the stream ends until
    /// the operator stops.
    pub fn hold_at_end(mut self, hold: bool) -> Self {
        self.hold_at_end = hold;
        self
    }

    pub fn run(mut self) -> Result<LoopReport, LoopError> {
        self.source.connect().map_err(LoopError::SourceOpen)?;
        if let Err(err) = self.display.open() {
            self.source.release();
            return Err(LoopError::Display(err));
        }
        log::info!(
            "detection loop started (classifier {}, wait {:?})",
            self.classifier.name(),
            self.wait
        );

        let mut state = LoopState::Running;
        let outcome = loop {
            match state {
                LoopState::Running => match self.step() {
                    Ok(next) => state = next,
                    Err(err) => break Err(err),
                },
                LoopState::Terminated(termination) => break Ok(termination),
            }
        };

        self.source.release();
        let outcome = match outcome {
            Ok(Termination::EndOfStream) if self.hold_at_end && self.display.is_interactive() => {
                self.hold().map(|()| Termination::EndOfStream)
            }
            other => other,
        };
        self.display.close();

        let termination = outcome.map_err(LoopError::Display)?;
        let stats = self.source.stats();
        log::info!(
            "detection loop finished: {} after {} frames from {} ({} detections)",
            termination,
            self.frames,
            stats.path,
            self.detections
        );
        Ok(LoopReport {
            frames: self.frames,
            detections: self.detections,
            last_detections: self.last_detections,
            termination,
        })
    }

    /// One iteration of the `Running` state.
    fn step(&mut self) -> anyhow::Result<LoopState> {
        let mut frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(LoopState::Terminated(Termination::EndOfStream)),
            Err(err) => {
                log::warn!("frame {} could not be decoded: {:#}", self.frames, err);
                return Ok(LoopState::Terminated(Termination::DecodeFailed(format!(
                    "{:#}",
                    err
                ))));
            }
        };

        let gray = frame.to_gray();
        let started = Instant::now();
        let detections = self.classifier.detect(&gray);
        self.classify_time += started.elapsed();

        draw_detections(&mut frame, &detections, &self.style);
        self.display
            .show(&frame)
            .with_context(|| format!("render frame {}", frame.index))?;

        self.frames += 1;
        self.detections += detections.len() as u64;
        log::debug!("frame {}: {} detections", frame.index, detections.len());
        if self.frames % PROGRESS_EVERY == 0 {
            log::info!(
                "{} frames processed, mean classification time {:.1} ms",
                self.frames,
                self.classify_time.as_secs_f64() * 1000.0 / self.frames as f64
            );
        }
        self.last_detections = detections;

        if self.display.wait_for_stop(self.wait)? {
            return Ok(LoopState::Terminated(Termination::OperatorStop));
        }
        Ok(LoopState::Running)
    }

    fn hold(&mut self) -> anyhow::Result<()> {
        log::info!("end of stream; holding last frame until stopped");
        while !self.display.wait_for_stop(self.wait)? {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FixedClassifier;
    use crate::display::{HeadlessDisplay, StopSignal};
    use crate::source::SyntheticSource;

    #[test]
    fn synthetic_run_ends_with_end_of_stream() {
        let source = SyntheticSource::with_frames("stub://4", 4);
        let classifier = FixedClassifier::always(vec![Detection::new(1, 1, 5, 5)]);
        let display = HeadlessDisplay::new(StopSignal::new());

        let report = DetectionLoop::new(source, classifier, display)
            .run()
            .unwrap();
        assert_eq!(report.termination, Termination::EndOfStream);
        assert_eq!(report.frames, 4);
        assert_eq!(report.detections, 4);
        assert_eq!(report.last_detections, vec![Detection::new(1, 1, 5, 5)]);
    }

    #[test]
    fn preset_stop_signal_stops_after_first_frame() {
        let stop = StopSignal::new();
        stop.trigger();
        let report = DetectionLoop::new(
            SyntheticSource::with_frames("stub://10", 10),
            FixedClassifier::empty(),
            HeadlessDisplay::new(stop),
        )
        .run()
        .unwrap();
        assert_eq!(report.termination, Termination::OperatorStop);
        assert_eq!(report.frames, 1);
    }

    #[test]
    fn termination_reads_naturally() {
        assert_eq!(Termination::EndOfStream.to_string(), "end of stream");
        assert_eq!(
            Termination::DecodeFailed("bad packet".into()).to_string(),
            "decode failure (bad packet)"
        );
    }
}
