use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use opencv::core::{Mat, Rect, Scalar, Size, Vector, CV_8UC1};
use opencv::objdetect;
use opencv::prelude::*;

use crate::cascade::ScanParams;
use crate::detect::classifier::Classifier;
use crate::detect::result::Detection;
use crate::frame::GrayFrame;

/// Cascade evaluated by OpenCV's `objdetect::CascadeClassifier`.
///
/// OpenCV needs `&mut` to run a scan, so the handle sits behind a mutex; the
/// classifier itself is still loaded once and never reconfigured.
pub struct OpencvCascadeClassifier {
    name: String,
    inner: Mutex<objdetect::CascadeClassifier>,
    params: ScanParams,
}

impl OpencvCascadeClassifier {
    pub fn load(path: impl AsRef<Path>, params: ScanParams) -> Result<Self> {
        params.validate()?;
        let path = path.as_ref();
        if !path.is_file() {
            bail!("cascade {} does not exist", path.display());
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("cascade path {} is not valid UTF-8", path.display()))?;
        let inner = objdetect::CascadeClassifier::new(path_str)
            .with_context(|| format!("failed to load cascade {}", path.display()))?;
        if inner.empty()? {
            bail!("OpenCV could not parse cascade {}", path.display());
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("opencv-cascade")
            .to_string();
        log::info!("loaded cascade {} with OpenCV objdetect", path.display());
        Ok(Self {
            name,
            inner: Mutex::new(inner),
            params,
        })
    }

    pub fn params(&self) -> &ScanParams {
        &self.params
    }

    fn run(&self, frame: &GrayFrame) -> Result<Vec<Detection>> {
        let mat = gray_to_mat(frame)?;
        let size = |dims: Option<(u32, u32)>| match dims {
            Some((w, h)) => Size::new(w as i32, h as i32),
            None => Size::default(),
        };
        let mut found = Vector::<Rect>::new();
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner
            .detect_multi_scale(
                &mat,
                &mut found,
                self.params.scale_factor,
                self.params.min_neighbors as i32,
                0,
                size(self.params.min_size),
                size(self.params.max_size),
            )
            .context("detect_multi_scale")?;
        Ok(found
            .iter()
            .map(|r| Detection::new(r.x, r.y, r.width, r.height))
            .collect())
    }
}

impl Classifier for OpencvCascadeClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, frame: &GrayFrame) -> Vec<Detection> {
        match self.run(frame) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!("frame {}: OpenCV detection failed: {:#}", frame.index, err);
                Vec::new()
            }
        }
    }
}

fn gray_to_mat(frame: &GrayFrame) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC1,
        Scalar::all(0.0),
    )
    .context("allocate gray frame")?;
    mat.data_bytes_mut()
        .context("gray frame bytes")?
        .copy_from_slice(frame.image().as_raw());
    Ok(mat)
}
