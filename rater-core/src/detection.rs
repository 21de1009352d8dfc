//! Reconciliation of machine-detected regions.
//!
//! Detectors report boxes in their own coordinate space with a bottom-left
//! origin. Reconciliation de-noises them, reflects them about the horizontal
//! mid-line of the detector's frame and packages them as [`UIElement`]s ready
//! for [`AnnotationSession::add_batch`](crate::AnnotationSession::add_batch).

use serde::{Deserialize, Serialize};

use crate::{RaterError, RaterResult, UIElement};

/// A raw box as reported by the detection collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBox {
    /// Left edge.
    pub x: f64,
    /// Bottom edge, in detector space.
    pub y: f64,
    /// Width as a fraction of the canvas.
    pub width: f64,
    /// Height as a fraction of the canvas.
    pub height: f64,
}

impl RawBox {
    /// Create a new raw box.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// One completed detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Boxes in detector space.
    pub boxes: Vec<RawBox>,
    /// Frame height the detector used for its coordinates.
    pub transform_height: f64,
}

/// Outcome of reconciling one detection pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Elements that survived, in detector order.
    pub elements: Vec<UIElement>,
    /// Boxes dropped as noise (below the size threshold).
    pub discarded: usize,
    /// Boxes whose transformed geometry fell outside `[0, 1]`.
    pub rejected: usize,
}

impl Reconciliation {
    /// Whether no element survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Transformed coordinates this close to a canvas edge are treated as on it.
pub const EDGE_TOLERANCE: f64 = 1e-9;

/// Reflect `y` about `transform_height / 2`.
fn reflect(y: f64, transform_height: f64) -> f64 {
    let axis = transform_height / 2.0;
    let offset = axis - y;
    axis + offset.signum() * offset.abs()
}

/// Snap rounding residue at the canvas edges back onto them.
fn snap_to_edge(value: f64) -> f64 {
    if value.abs() <= EDGE_TOLERANCE {
        0.0
    } else if (value - 1.0).abs() <= EDGE_TOLERANCE {
        1.0
    } else {
        value
    }
}

/// Convert raw detector boxes into session elements.
///
/// Boxes with `width` or `height` below `noise_threshold` are discarded. The
/// rest have their `y` reflected about half of `transform_height` and then
/// normalized as `y / transform_height - height`. A transformed `y` within
/// [`EDGE_TOLERANCE`] of 0 or 1 is snapped onto that edge, so boxes flush with
/// the frame survive floating-point residue. Anything further out is rejected
/// and counted, never clamped or silently dropped.
///
/// # Errors
///
/// Returns [`RaterError::InvalidGeometry`] if `transform_height` is not finite
/// and strictly positive.
pub fn reconcile_detected_regions(
    raw_boxes: &[RawBox],
    transform_height: f64,
    noise_threshold: f64,
) -> RaterResult<Reconciliation> {
    if !(transform_height.is_finite() && transform_height > 0.0) {
        return Err(RaterError::InvalidGeometry(format!(
            "transform height {transform_height} must be finite and positive"
        )));
    }

    let mut result = Reconciliation::default();
    for raw in raw_boxes {
        if raw.width < noise_threshold || raw.height < noise_threshold {
            result.discarded += 1;
            continue;
        }
        let y = snap_to_edge(reflect(raw.y, transform_height) / transform_height - raw.height);
        match UIElement::new(raw.x, y, raw.width, raw.height) {
            Ok(element) => result.elements.push(element),
            Err(e) => {
                tracing::warn!("Rejecting detected box {raw:?}: {e}");
                result.rejected += 1;
            }
        }
    }

    tracing::debug!(
        kept = result.elements.len(),
        discarded = result.discarded,
        rejected = result.rejected,
        "Reconciled detected regions"
    );
    Ok(result)
}
