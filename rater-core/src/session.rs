//! Annotation sessions.
//!
//! A session accumulates UI elements as an ordered history of batches. A batch
//! is one atomic contribution: a completed drag gesture or a whole detection
//! pass. Undo pops whole batches, so it always reverts the most recent
//! contribution rather than the most recent element.
//!
//! Two tracks feed the history and may interleave:
//!
//! ```text
//! gesture:    Idle --begin_gesture--> Drawing --end_gesture--> Idle (+1 batch)
//! detection:  Idle --begin_detection--> Detecting --complete--> Idle (+1 batch)
//!                                                 --fail------> Idle
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RaterConfig;
use crate::detection::{self, Detection, RawBox, Reconciliation};
use crate::schema::{RatingRequest, SessionDocument};
use crate::{Canvas, Point, RaterError, RaterResult, UIElement};

/// Where a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOrigin {
    /// Drawn by the user.
    Manual,
    /// Produced by one detection pass.
    Detected,
}

/// One atomic contribution to the session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Origin of the contribution.
    pub origin: BatchOrigin,
    /// Live elements, in insertion order. May become empty through removals.
    pub elements: Vec<UIElement>,
}

/// Identifies an in-flight detection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectionTicket(Uuid);

impl DetectionTicket {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for DetectionTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Elements built from untrusted rectangles, with the rejection count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchDraft {
    /// Elements that passed validation.
    pub elements: Vec<UIElement>,
    /// Rectangles dropped for invalid geometry.
    pub rejected: usize,
}

impl BatchDraft {
    /// Validate `(x, y, width, height)` rectangles one by one.
    ///
    /// An invalid rectangle drops only itself; the rest of the draft survives.
    #[must_use]
    pub fn from_rects(rects: impl IntoIterator<Item = (f64, f64, f64, f64)>) -> Self {
        let mut draft = Self::default();
        for (x, y, width, height) in rects {
            match UIElement::new(x, y, width, height) {
                Ok(element) => draft.elements.push(element),
                Err(e) => {
                    tracing::warn!("Dropping element from batch: {e}");
                    draft.rejected += 1;
                }
            }
        }
        draft
    }
}

/// Result of applying a completed detection pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionOutcome {
    /// Elements appended as a new batch (0 means no batch was appended).
    pub appended: usize,
    /// Boxes dropped as noise.
    pub discarded: usize,
    /// Boxes rejected for invalid geometry.
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    start: Point,
    current: Point,
}

/// Undo-capable accumulator of UI elements for one canvas.
#[derive(Debug, Clone)]
pub struct AnnotationSession {
    canvas: Canvas,
    history: Vec<Batch>,
    drag: Option<Drag>,
    detection: Option<DetectionTicket>,
    noise_threshold: f64,
    min_elements: usize,
}

impl AnnotationSession {
    /// Create an empty session for `canvas` with default configuration.
    #[must_use]
    pub fn new(canvas: Canvas) -> Self {
        Self::with_config(canvas, &RaterConfig::default())
    }

    /// Create an empty session with explicit configuration.
    #[must_use]
    pub fn with_config(canvas: Canvas, config: &RaterConfig) -> Self {
        Self {
            canvas,
            history: Vec::new(),
            drag: None,
            detection: None,
            noise_threshold: config.noise_threshold,
            min_elements: config.min_elements,
        }
    }

    /// The canvas this session annotates.
    #[must_use]
    pub const fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Batches in contribution order.
    #[must_use]
    pub fn batches(&self) -> &[Batch] {
        &self.history
    }

    /// Number of batches in the history.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.history.len()
    }

    /// Number of live elements across all batches.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.history.iter().map(|batch| batch.elements.len()).sum()
    }

    /// Append a manual batch.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::EmptyBatch`] if `elements` is empty.
    pub fn add_batch(&mut self, elements: Vec<UIElement>) -> RaterResult<usize> {
        self.add_batch_with_origin(BatchOrigin::Manual, elements)
    }

    /// Append a batch, collapsing geometric duplicates within it.
    ///
    /// Returns the number of elements the new batch holds.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::EmptyBatch`] if `elements` is empty. History is
    /// unchanged in that case.
    pub fn add_batch_with_origin(
        &mut self,
        origin: BatchOrigin,
        elements: Vec<UIElement>,
    ) -> RaterResult<usize> {
        if elements.is_empty() {
            return Err(RaterError::EmptyBatch);
        }
        let mut unique: Vec<UIElement> = Vec::with_capacity(elements.len());
        for element in elements {
            if unique.contains(&element) {
                tracing::debug!("Collapsing duplicate element {element} in batch");
            } else {
                unique.push(element);
            }
        }
        let count = unique.len();
        self.history.push(Batch {
            origin,
            elements: unique,
        });
        tracing::debug!(
            "Appended {origin:?} batch #{} with {count} element(s)",
            self.history.len()
        );
        Ok(count)
    }

    /// Remove the most recent element geometrically equal to `target`.
    ///
    /// The owning batch stays in the history even if it becomes empty.
    /// Returns whether an element was removed; a missing target is a no-op.
    pub fn remove_element(&mut self, target: &UIElement) -> bool {
        for batch in self.history.iter_mut().rev() {
            if let Some(index) = batch.elements.iter().position(|e| e == target) {
                batch.elements.remove(index);
                return true;
            }
        }
        tracing::debug!("Remove target {target} not present");
        false
    }

    /// Replace the element geometrically equal to `target` with a copy
    /// carrying `text` as its annotation.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::ElementNotFound`] if no element matches.
    pub fn annotate(&mut self, target: &UIElement, text: impl Into<String>) -> RaterResult<()> {
        let slot = self
            .history
            .iter_mut()
            .rev()
            .find_map(|batch| batch.elements.iter_mut().find(|e| **e == *target))
            .ok_or_else(|| RaterError::ElementNotFound(target.to_string()))?;
        *slot = slot.clone().with_annotation(text);
        Ok(())
    }

    /// Discard the most recent batch, returning how many live elements it
    /// held. Returns 0 when the history is empty, in which case the caller
    /// should dismiss the session instead.
    pub fn undo(&mut self) -> usize {
        match self.history.pop() {
            Some(batch) => {
                tracing::debug!(
                    "Undid {:?} batch with {} element(s)",
                    batch.origin,
                    batch.elements.len()
                );
                batch.elements.len()
            }
            None => 0,
        }
    }

    /// All live elements, in batch order then insertion order.
    #[must_use]
    pub fn current_elements(&self) -> Vec<UIElement> {
        self.history
            .iter()
            .flat_map(|batch| batch.elements.iter().cloned())
            .collect()
    }

    /// The most recently added element containing the normalized point.
    #[must_use]
    pub fn element_at(&self, x: f64, y: f64) -> Option<&UIElement> {
        self.history
            .iter()
            .rev()
            .flat_map(|batch| batch.elements.iter().rev())
            .find(|e| e.contains_point(x, y))
    }

    /// Turn raw detector boxes into a batch ready for [`Self::add_batch`],
    /// using this session's noise threshold.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidGeometry`] for an invalid transform height.
    pub fn reconcile_detected_regions(
        &self,
        raw_boxes: &[RawBox],
        transform_height: f64,
    ) -> RaterResult<Reconciliation> {
        detection::reconcile_detected_regions(raw_boxes, transform_height, self.noise_threshold)
    }

    // -----------------------------------------------------------------------
    // Gesture track
    // -----------------------------------------------------------------------

    /// Whether a drag gesture is in progress.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.drag.is_some()
    }

    /// Start a drag at `point` (canvas pixels).
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] if a drag is already active.
    pub fn begin_gesture(&mut self, point: Point) -> RaterResult<()> {
        if self.drag.is_some() {
            return Err(RaterError::InvalidTransition(
                "gesture already in progress".into(),
            ));
        }
        self.drag = Some(Drag {
            start: point,
            current: point,
        });
        Ok(())
    }

    /// Track the drag's current corner.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] if no drag is active.
    pub fn update_gesture(&mut self, point: Point) -> RaterResult<()> {
        let drag = self
            .drag
            .as_mut()
            .ok_or_else(|| RaterError::InvalidTransition("no gesture in progress".into()))?;
        drag.current = point;
        Ok(())
    }

    /// The rectangle currently being dragged, for live preview.
    #[must_use]
    pub fn gesture_preview(&self) -> Option<(Point, Point)> {
        self.drag.map(|drag| (drag.start, drag.current))
    }

    /// Finish the drag at `point` and append it as a one-element batch.
    ///
    /// The session returns to idle whether or not the element is valid.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] if no drag is active, or
    /// [`RaterError::InvalidGeometry`] if the drag leaves the canvas or
    /// encloses no area. History is unchanged on error.
    pub fn end_gesture(&mut self, point: Point) -> RaterResult<UIElement> {
        let drag = self
            .drag
            .take()
            .ok_or_else(|| RaterError::InvalidTransition("no gesture in progress".into()))?;
        let element = UIElement::from_corners(drag.start, point, &self.canvas)?;
        if element.width() <= 0.0 || element.height() <= 0.0 {
            return Err(RaterError::InvalidGeometry(format!(
                "gesture {element} encloses no area"
            )));
        }
        self.add_batch(vec![element.clone()])?;
        Ok(element)
    }

    /// Abandon the current drag. Returns whether one was active.
    pub fn cancel_gesture(&mut self) -> bool {
        self.drag.take().is_some()
    }

    // -----------------------------------------------------------------------
    // Detection track
    // -----------------------------------------------------------------------

    /// Whether a detection request is in flight.
    #[must_use]
    pub fn is_detecting(&self) -> bool {
        self.detection.is_some()
    }

    /// Record that a detection request was issued.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] if one is already in flight.
    pub fn begin_detection(&mut self) -> RaterResult<DetectionTicket> {
        if let Some(ticket) = self.detection {
            return Err(RaterError::InvalidTransition(format!(
                "detection {ticket} already in flight"
            )));
        }
        let ticket = DetectionTicket::new();
        self.detection = Some(ticket);
        tracing::debug!("Detection {ticket} started");
        Ok(ticket)
    }

    fn settle_detection(&mut self, ticket: DetectionTicket) -> RaterResult<()> {
        if self.detection == Some(ticket) {
            self.detection = None;
            Ok(())
        } else {
            Err(RaterError::InvalidTransition(format!(
                "detection {ticket} is not in flight"
            )))
        }
    }

    /// Apply a finished detection pass as the newest batch.
    ///
    /// If nothing survives reconciliation no batch is appended.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] for an unknown or stale
    /// ticket, or [`RaterError::InvalidGeometry`] for an invalid transform
    /// height (the detection is settled either way).
    pub fn complete_detection(
        &mut self,
        ticket: DetectionTicket,
        detection: &Detection,
    ) -> RaterResult<DetectionOutcome> {
        self.settle_detection(ticket)?;
        let reconciled =
            self.reconcile_detected_regions(&detection.boxes, detection.transform_height)?;
        let mut outcome = DetectionOutcome {
            appended: 0,
            discarded: reconciled.discarded,
            rejected: reconciled.rejected,
        };
        if reconciled.is_empty() {
            tracing::info!("Detection {ticket} produced no usable regions");
        } else {
            outcome.appended =
                self.add_batch_with_origin(BatchOrigin::Detected, reconciled.elements)?;
        }
        Ok(outcome)
    }

    /// Record that a detection request failed.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] for an unknown or stale
    /// ticket.
    pub fn fail_detection(&mut self, ticket: DetectionTicket, reason: &str) -> RaterResult<()> {
        self.settle_detection(ticket)?;
        tracing::warn!("Detection {ticket} failed: {reason}");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Submission and snapshots
    // -----------------------------------------------------------------------

    /// Shape the scoring request for the current elements.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InsufficientInput`] when fewer than the
    /// configured minimum elements are live.
    pub fn submission(&self) -> RaterResult<RatingRequest> {
        let items = self.current_elements();
        if items.len() < self.min_elements {
            return Err(RaterError::InsufficientInput {
                found: items.len(),
                required: self.min_elements,
            });
        }
        Ok(RatingRequest {
            items,
            canvas: self.canvas,
        })
    }

    /// Snapshot the history as a document.
    #[must_use]
    pub fn to_document(&self) -> SessionDocument {
        SessionDocument {
            canvas: self.canvas,
            batches: self.history.clone(),
        }
    }

    /// Rebuild an idle session from a document.
    #[must_use]
    pub fn from_document(document: SessionDocument, config: &RaterConfig) -> Self {
        let mut session = Self::with_config(document.canvas, config);
        session.history = document.batches;
        session
    }

    /// Serialize the history to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> RaterResult<String> {
        serde_json::to_string(&self.to_document()).map_err(RaterError::Serialization)
    }

    /// Deserialize a session from JSON with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or any element is invalid.
    pub fn from_json(json: &str) -> RaterResult<Self> {
        let document: SessionDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(document, &RaterConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Canvas {
        Canvas::new(400.0, 800.0).expect("canvas")
    }

    fn el(x: f64, y: f64) -> UIElement {
        UIElement::new(x, y, 0.1, 0.1).expect("valid")
    }

    #[test]
    fn test_add_batch_and_count() {
        let mut session = AnnotationSession::new(canvas());
        session.add_batch(vec![el(0.1, 0.1)]).expect("add");
        session
            .add_batch(vec![el(0.2, 0.2), el(0.3, 0.3)])
            .expect("add");
        assert_eq!(session.depth(), 2);
        assert_eq!(session.element_count(), 3);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let mut session = AnnotationSession::new(canvas());
        assert!(matches!(session.add_batch(Vec::new()), Err(RaterError::EmptyBatch)));
        assert_eq!(session.depth(), 0);
    }

    #[test]
    fn test_batch_collapses_duplicates() {
        let mut session = AnnotationSession::new(canvas());
        let added = session
            .add_batch(vec![el(0.1, 0.1), el(0.1, 0.1).with_annotation("dup")])
            .expect("add");
        assert_eq!(added, 1);
    }

    #[test]
    fn test_current_elements_order() {
        let mut session = AnnotationSession::new(canvas());
        session.add_batch(vec![el(0.5, 0.5)]).expect("add");
        session
            .add_batch(vec![el(0.1, 0.1), el(0.2, 0.2)])
            .expect("add");
        assert_eq!(
            session.current_elements(),
            vec![el(0.5, 0.5), el(0.1, 0.1), el(0.2, 0.2)]
        );
    }

    #[test]
    fn test_remove_keeps_batch_slot() {
        let mut session = AnnotationSession::new(canvas());
        session.add_batch(vec![el(0.1, 0.1)]).expect("add");
        session.add_batch(vec![el(0.2, 0.2)]).expect("add");
        assert!(session.remove_element(&el(0.2, 0.2)));
        assert_eq!(session.depth(), 2);
        assert_eq!(session.element_count(), 1);
        // Undo pops the now-empty batch, not the older one.
        assert_eq!(session.undo(), 0);
        assert_eq!(session.current_elements(), vec![el(0.1, 0.1)]);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut session = AnnotationSession::new(canvas());
        session.add_batch(vec![el(0.1, 0.1)]).expect("add");
        assert!(!session.remove_element(&el(0.9, 0.9)));
        assert_eq!(session.element_count(), 1);
    }

    #[test]
    fn test_remove_prefers_most_recent_batch() {
        let mut session = AnnotationSession::new(canvas());
        session
            .add_batch(vec![el(0.1, 0.1).with_annotation("old")])
            .expect("add");
        session
            .add_batch(vec![el(0.1, 0.1).with_annotation("new")])
            .expect("add");
        session.remove_element(&el(0.1, 0.1));
        let remaining = session.current_elements();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].annotation(), Some("old"));
    }

    #[test]
    fn test_annotate_then_remove_by_geometry() {
        let mut session = AnnotationSession::new(canvas());
        let target = el(0.3, 0.4);
        session.add_batch(vec![target.clone()]).expect("add");
        session.annotate(&target, "x").expect("annotate");
        assert_eq!(session.current_elements()[0].annotation(), Some("x"));
        assert!(session.remove_element(&target));
        assert!(session.current_elements().is_empty());
    }

    #[test]
    fn test_annotate_missing_fails_without_side_effects() {
        let mut session = AnnotationSession::new(canvas());
        session.add_batch(vec![el(0.1, 0.1)]).expect("add");
        let result = session.annotate(&el(0.7, 0.7), "nope");
        assert!(matches!(result, Err(RaterError::ElementNotFound(_))));
        assert_eq!(session.depth(), 1);
    }

    #[test]
    fn test_undo_restores_previous_elements() {
        let mut session = AnnotationSession::new(canvas());
        session.add_batch(vec![el(0.1, 0.1)]).expect("add");
        let before = session.current_elements();
        session
            .add_batch(vec![el(0.2, 0.2), el(0.3, 0.3)])
            .expect("add");
        assert_eq!(session.undo(), 2);
        assert_eq!(session.current_elements(), before);
    }

    #[test]
    fn test_undo_on_empty_history() {
        let mut session = AnnotationSession::new(canvas());
        assert_eq!(session.undo(), 0);
    }

    #[test]
    fn test_manual_then_detected_then_undo() {
        let mut session = AnnotationSession::new(canvas());
        session.add_batch(vec![el(0.05, 0.05)]).expect("manual");
        let ticket = session.begin_detection().expect("begin");
        let detection = Detection {
            boxes: vec![
                RawBox::new(0.1, 0.8, 0.1, 0.1),
                RawBox::new(0.3, 0.6, 0.1, 0.1),
                RawBox::new(0.5, 0.4, 0.1, 0.1),
            ],
            transform_height: 1.0,
        };
        let outcome = session
            .complete_detection(ticket, &detection)
            .expect("complete");
        assert_eq!(outcome.appended, 3);
        assert_eq!(session.element_count(), 4);
        assert_eq!(session.undo(), 3);
        assert_eq!(session.element_count(), 1);
    }

    #[test]
    fn test_detection_lands_after_interleaved_manual_batches() {
        let mut session = AnnotationSession::new(canvas());
        let ticket = session.begin_detection().expect("begin");
        for i in 0..3 {
            session
                .add_batch(vec![el(0.1 * f64::from(i), 0.0)])
                .expect("manual");
        }
        let detection = Detection {
            boxes: vec![RawBox::new(0.6, 0.5, 0.2, 0.2)],
            transform_height: 1.0,
        };
        session
            .complete_detection(ticket, &detection)
            .expect("complete");
        assert_eq!(session.depth(), 4);
        assert_eq!(session.batches()[3].origin, BatchOrigin::Detected);
        assert!(!session.is_detecting());
    }

    #[test]
    fn test_detection_ticket_discipline() {
        let mut session = AnnotationSession::new(canvas());
        let ticket = session.begin_detection().expect("begin");
        assert!(matches!(
            session.begin_detection(),
            Err(RaterError::InvalidTransition(_))
        ));
        session.fail_detection(ticket, "timeout").expect("fail");
        assert!(!session.is_detecting());
        let empty = Detection {
            boxes: Vec::new(),
            transform_height: 1.0,
        };
        assert!(matches!(
            session.complete_detection(ticket, &empty),
            Err(RaterError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_noise_only_detection_appends_nothing() {
        let mut session = AnnotationSession::new(canvas());
        let ticket = session.begin_detection().expect("begin");
        let detection = Detection {
            boxes: vec![RawBox::new(0.1, 0.5, 0.001, 0.2)],
            transform_height: 1.0,
        };
        let outcome = session
            .complete_detection(ticket, &detection)
            .expect("complete");
        assert_eq!(outcome.appended, 0);
        assert_eq!(outcome.discarded, 1);
        assert_eq!(session.depth(), 0);
    }

    #[test]
    fn test_gesture_appends_batch() {
        let mut session = AnnotationSession::new(canvas());
        session.begin_gesture(Point::new(40.0, 80.0)).expect("begin");
        assert!(session.is_drawing());
        session.update_gesture(Point::new(100.0, 200.0)).expect("move");
        assert!(session.gesture_preview().is_some());
        let element = session.end_gesture(Point::new(200.0, 400.0)).expect("end");
        assert!(!session.is_drawing());
        assert!((element.x() - 0.1).abs() < 1e-9);
        assert!((element.height() - 0.4).abs() < 1e-9);
        assert_eq!(session.depth(), 1);
    }

    #[test]
    fn test_gesture_errors_leave_history_unchanged() {
        let mut session = AnnotationSession::new(canvas());
        assert!(matches!(
            session.end_gesture(Point::new(1.0, 1.0)),
            Err(RaterError::InvalidTransition(_))
        ));
        session.begin_gesture(Point::new(10.0, 10.0)).expect("begin");
        assert!(session.begin_gesture(Point::new(0.0, 0.0)).is_err());
        assert!(matches!(
            session.end_gesture(Point::new(10.0, 10.0)),
            Err(RaterError::InvalidGeometry(_))
        ));
        session.begin_gesture(Point::new(10.0, 10.0)).expect("begin");
        assert!(matches!(
            session.end_gesture(Point::new(900.0, 50.0)),
            Err(RaterError::InvalidGeometry(_))
        ));
        assert_eq!(session.depth(), 0);
        assert!(!session.cancel_gesture());
    }

    #[test]
    fn test_submission_requires_minimum() {
        let mut session = AnnotationSession::new(canvas());
        session.add_batch(vec![el(0.1, 0.1)]).expect("add");
        assert!(matches!(
            session.submission(),
            Err(RaterError::InsufficientInput {
                found: 1,
                required: 2
            })
        ));
        session.add_batch(vec![el(0.2, 0.2)]).expect("add");
        let request = session.submission().expect("enough");
        assert_eq!(request.items.len(), 2);
        assert_eq!(request.canvas, canvas());
    }

    #[test]
    fn test_element_at_picks_newest() {
        let mut session = AnnotationSession::new(canvas());
        let big = UIElement::new(0.0, 0.0, 0.5, 0.5).expect("valid");
        let small = UIElement::new(0.1, 0.1, 0.1, 0.1).expect("valid");
        session.add_batch(vec![big.clone()]).expect("add");
        session.add_batch(vec![small.clone()]).expect("add");
        assert_eq!(session.element_at(0.15, 0.15), Some(&small));
        assert_eq!(session.element_at(0.4, 0.4), Some(&big));
        assert_eq!(session.element_at(0.9, 0.9), None);
    }

    #[test]
    fn test_batch_draft_drops_only_invalid() {
        let draft = BatchDraft::from_rects([(0.1, 0.1, 0.2, 0.2), (1.5, 0.0, 0.1, 0.1)]);
        assert_eq!(draft.elements.len(), 1);
        assert_eq!(draft.rejected, 1);
    }

    #[test]
    fn test_snapshot_preserves_identity_of_arbitrary_floats() {
        let mut session = AnnotationSession::new(canvas());
        let awkward = UIElement::new(0.985_690_694_632_869_5, 0.924_910_110_812_999_7, 0.01, 0.07)
            .expect("valid");
        session.add_batch(vec![awkward.clone(), el(0.1, 0.1)]).expect("add");

        let mut restored =
            AnnotationSession::from_json(&session.to_json().expect("serialize")).expect("parse");
        restored.annotate(&awkward, "badge").expect("annotate by original geometry");
        assert!(restored.remove_element(&awkward));
        assert_eq!(restored.current_elements(), vec![el(0.1, 0.1)]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut session = AnnotationSession::new(canvas());
        session
            .add_batch(vec![el(0.1, 0.1).with_annotation("header")])
            .expect("add");
        let json = session.to_json().expect("serialize");
        let restored = AnnotationSession::from_json(&json).expect("deserialize");
        assert_eq!(restored.batches(), session.batches());
        assert_eq!(
            restored.current_elements()[0].annotation(),
            Some("header")
        );
    }
}
