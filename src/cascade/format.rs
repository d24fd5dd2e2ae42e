//! Cascade layouts understood by the loader.
//!
//! OpenCV writes two XML layouts:
//!
//! - the current `<cascade>` layout (`opencv_traincascade`), with weak classifiers
//!   stored as flat `internalNodes`/`leafValues` lists and a shared feature table;
//! - the legacy `opencv-haar-classifier` layout (`opencv_haartraining`), with trees of
//!   nodes that embed their feature and reference leaves by `left_val`/`right_val`.
//!
//! Both are converted to the same in-memory model.

use anyhow::{anyhow, bail, Context, Result};

use super::xml::XmlNode;
use super::{Feature, Node, Stage, WeakClassifier, WeightedRect};

/// OpenCV subtracts this from every stage threshold on load.
const THRESHOLD_EPS: f32 = 1e-5;

pub(crate) struct CascadeParts {
    pub window: (u32, u32),
    pub stages: Vec<Stage>,
    pub features: Vec<Feature>,
}

pub(crate) fn read_cascade(root: &XmlNode) -> Result<CascadeParts> {
    let storage = root
        .child("opencv_storage")
        .ok_or_else(|| anyhow!("not an OpenCV storage document (missing <opencv_storage>)"))?;

    let parts = if let Some(cascade) = storage.child("cascade") {
        read_current(cascade).context("reading <cascade>")?
    } else {
        let legacy = storage
            .children
            .iter()
            .find(|c| c.child("size").is_some() && c.child("stages").is_some())
            .ok_or_else(|| anyhow!("no cascade found in <opencv_storage>"))?;
        read_legacy(legacy).with_context(|| format!("reading legacy cascade <{}>", legacy.name))?
    };

    validate(&parts)?;
    Ok(parts)
}

// ----------------------------------------------------------------------------
// Current layout
// ----------------------------------------------------------------------------

fn read_current(node: &XmlNode) -> Result<CascadeParts> {
    if let Some(stage_type) = node.child("stageType") {
        if stage_type.text.trim() != "BOOST" {
            bail!("unsupported stage type '{}'", stage_type.text.trim());
        }
    }
    if let Some(feature_type) = node.child("featureType") {
        let kind = feature_type.text.trim();
        if !kind.eq_ignore_ascii_case("HAAR") {
            bail!("unsupported feature type '{}'; only HAAR cascades are supported", kind);
        }
    }

    let window = (
        node.require("width")?.value::<u32>()?,
        node.require("height")?.value::<u32>()?,
    );

    let mut stages = Vec::new();
    for stage in node.require("stages")?.items() {
        let threshold = stage.require("stageThreshold")?.value::<f32>()? - THRESHOLD_EPS;
        let mut classifiers = Vec::new();
        for weak in stage.require("weakClassifiers")?.items() {
            let raw = weak.require("internalNodes")?.values::<f64>()?;
            if raw.is_empty() || raw.len() % 4 != 0 {
                bail!("internalNodes must hold groups of 4 values, got {}", raw.len());
            }
            let nodes = raw
                .chunks_exact(4)
                .map(|c| Node {
                    left: c[0] as i32,
                    right: c[1] as i32,
                    feature: c[2] as usize,
                    threshold: c[3] as f32,
                })
                .collect();
            let leaves = weak.require("leafValues")?.values::<f32>()?;
            classifiers.push(WeakClassifier { nodes, leaves });
        }
        stages.push(Stage {
            threshold,
            classifiers,
        });
    }

    let features = node
        .require("features")?
        .items()
        .map(read_feature)
        .collect::<Result<Vec<_>>>()?;

    Ok(CascadeParts {
        window,
        stages,
        features,
    })
}

// ----------------------------------------------------------------------------
// Legacy layout
// ----------------------------------------------------------------------------

fn read_legacy(node: &XmlNode) -> Result<CascadeParts> {
    let size = node.require("size")?.values::<u32>()?;
    let window = match size.as_slice() {
        [w, h] => (*w, *h),
        _ => bail!("<size> must hold two values"),
    };

    let mut stages = Vec::new();
    let mut features = Vec::new();
    for stage in node.require("stages")?.items() {
        let threshold = stage.require("stage_threshold")?.value::<f32>()? - THRESHOLD_EPS;
        let mut classifiers = Vec::new();
        for tree in stage.require("trees")?.items() {
            let mut nodes = Vec::new();
            let mut leaves = Vec::new();
            for tree_node in tree.items() {
                features.push(read_feature(tree_node.require("feature")?)?);
                let left = legacy_branch(tree_node, "left_val", "left_node", &mut leaves)?;
                let right = legacy_branch(tree_node, "right_val", "right_node", &mut leaves)?;
                nodes.push(Node {
                    left,
                    right,
                    feature: features.len() - 1,
                    threshold: tree_node.require("threshold")?.value::<f32>()?,
                });
            }
            classifiers.push(WeakClassifier { nodes, leaves });
        }
        stages.push(Stage {
            threshold,
            classifiers,
        });
    }

    Ok(CascadeParts {
        window,
        stages,
        features,
    })
}

/// Encode a legacy branch: leaves as `-(leaf index)`, inner nodes as their index.
fn legacy_branch(
    node: &XmlNode,
    leaf_tag: &str,
    node_tag: &str,
    leaves: &mut Vec<f32>,
) -> Result<i32> {
    if let Some(leaf) = node.child(leaf_tag) {
        leaves.push(leaf.value::<f32>()?);
        Ok(-((leaves.len() - 1) as i32))
    } else if let Some(next) = node.child(node_tag) {
        next.value::<i32>()
    } else {
        bail!("tree node has neither <{}> nor <{}>", leaf_tag, node_tag)
    }
}

// ----------------------------------------------------------------------------
// Shared
// ----------------------------------------------------------------------------

fn read_feature(node: &XmlNode) -> Result<Feature> {
    let rects = node
        .require("rects")?
        .items()
        .map(|r| {
            let v = r.values::<f32>()?;
            match v.as_slice() {
                [x, y, w, h, weight] => Ok(WeightedRect {
                    x: *x as i32,
                    y: *y as i32,
                    width: *w as i32,
                    height: *h as i32,
                    weight: *weight,
                }),
                _ => Err(anyhow!("feature rect must hold 5 values, got {}", v.len())),
            }
        })
        .collect::<Result<Vec<_>>>()?;
    if rects.is_empty() {
        bail!("feature has no rects");
    }
    let tilted = match node.child("tilted") {
        Some(t) => t.value::<i32>()? != 0,
        None => false,
    };
    Ok(Feature { rects, tilted })
}

fn validate(parts: &CascadeParts) -> Result<()> {
    let (ww, wh) = (parts.window.0 as i32, parts.window.1 as i32);
    if ww < 3 || wh < 3 {
        bail!("detection window {}x{} is too small", ww, wh);
    }
    if parts.stages.is_empty() {
        bail!("cascade has no stages");
    }

    for (fi, feature) in parts.features.iter().enumerate() {
        for r in &feature.rects {
            let inside = if feature.tilted {
                r.width > 0
                    && r.height > 0
                    && r.x - r.height >= 0
                    && r.y >= 0
                    && r.x + r.width <= ww
                    && r.y + r.width + r.height <= wh
            } else {
                r.width > 0
                    && r.height > 0
                    && r.x >= 0
                    && r.y >= 0
                    && r.x + r.width <= ww
                    && r.y + r.height <= wh
            };
            if !inside {
                bail!(
                    "feature {} rect ({}, {}, {}, {}) falls outside the {}x{} window",
                    fi,
                    r.x,
                    r.y,
                    r.width,
                    r.height,
                    ww,
                    wh
                );
            }
        }
    }

    for (si, stage) in parts.stages.iter().enumerate() {
        for weak in &stage.classifiers {
            if weak.nodes.is_empty() {
                bail!("stage {} has a weak classifier without nodes", si);
            }
            for (ni, node) in weak.nodes.iter().enumerate() {
                if node.feature >= parts.features.len() {
                    bail!("stage {} references missing feature {}", si, node.feature);
                }
                // Trees are stored in pre-order: inner branches only point forward.
                for branch in [node.left, node.right] {
                    let ok = if branch > 0 {
                        (branch as usize) > ni && (branch as usize) < weak.nodes.len()
                    } else {
                        ((-branch) as usize) < weak.leaves.len()
                    };
                    if !ok {
                        bail!(
                            "stage {} node {} has an invalid tree branch {}",
                            si,
                            ni,
                            branch
                        );
                    }
                }
            }
        }
    }
    Ok(())
}
