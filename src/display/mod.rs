//! Display surfaces.
//!
//! A display renders annotated frames and yields briefly after each one so the
//! operator can ask the loop to stop. It is opened once before the first frame and
//! closed once when the loop ends.

mod headless;
#[cfg(feature = "opencv")]
mod highgui;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::frame::ColorFrame;

pub use headless::HeadlessDisplay;
#[cfg(feature = "opencv")]
pub use highgui::HighguiDisplay;

/// Render target for annotated frames.
pub trait Display {
    /// Acquire the surface (create the window, prepare output directories).
    fn open(&mut self) -> Result<()>;

    /// Render one frame.
    fn show(&mut self, frame: &ColorFrame) -> Result<()>;

    /// Yield for `wait` and report whether the operator asked to stop.
    fn wait_for_stop(&mut self, wait: Duration) -> Result<bool>;

    /// Tear the surface down. Errors are logged, not returned.
    fn close(&mut self);

    /// True when an operator is looking at the output and can stop it interactively.
    fn is_interactive(&self) -> bool {
        false
    }
}

impl<D: Display + ?Sized> Display for &mut D {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn show(&mut self, frame: &ColorFrame) -> Result<()> {
        (**self).show(frame)
    }

    fn wait_for_stop(&mut self, wait: Duration) -> Result<bool> {
        (**self).wait_for_stop(wait)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn show(&mut self, frame: &ColorFrame) -> Result<()> {
        (**self).show(frame)
    }

    fn wait_for_stop(&mut self, wait: Duration) -> Result<bool> {
        (**self).wait_for_stop(wait)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }
}

/// Cross-thread stop flag, set from a signal handler and polled by a display.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Route Ctrl-C to this signal. Only one handler can be installed per process.
    pub fn install_ctrlc(&self) -> Result<()> {
        let signal = self.clone();
        ctrlc::set_handler(move || {
            log::info!("stop requested (Ctrl-C)");
            signal.trigger();
        })
        .context("error setting Ctrl-C handler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let signal = StopSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_set());
        signal.trigger();
        assert!(observer.is_set());
    }
}
