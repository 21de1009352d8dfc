//! # Session actor
//!
//! Serializes every mutation of an [`AnnotationSession`] through one ordered
//! queue. The session is moved into a tokio task that drains an `mpsc`
//! channel; callers hold a cloneable [`SessionHandle`] and await `oneshot`
//! replies. Detection runs on its own task and enqueues its result like any
//! other command, so it never touches the session directly.
//!
//! ```text
//! SessionHandle ──mpsc──▶ actor task (owns AnnotationSession)
//!       ▲                      │
//!       └──── oneshot reply ───┤
//!                              └──broadcast──▶ SessionEvent subscribers
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::boundary::RegionDetector;
use crate::config::RaterConfig;
use crate::detection::Detection;
use crate::schema::RatingRequest;
use crate::session::{
    AnnotationSession, BatchDraft, BatchOrigin, DetectionOutcome, DetectionTicket,
};
use crate::{Point, RaterError, RaterResult, UIElement};

/// Status reports published by the actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A batch was appended to the history.
    BatchAppended {
        /// Where the batch came from.
        origin: BatchOrigin,
        /// Elements in the batch.
        count: usize,
        /// History depth after the append.
        depth: usize,
    },
    /// Input rectangles were dropped for invalid geometry.
    ElementsRejected {
        /// How many were dropped.
        count: usize,
    },
    /// An element was removed.
    ElementRemoved {
        /// The removed element.
        element: UIElement,
    },
    /// An element's annotation changed.
    ElementAnnotated {
        /// The element with its new annotation.
        element: UIElement,
    },
    /// The newest batch was undone.
    Undone {
        /// Live elements the batch held.
        removed: usize,
        /// History depth after the undo.
        depth: usize,
    },
    /// Undo was requested on an empty history; the session should close.
    DismissRequested,
    /// A detection request was issued.
    DetectionStarted {
        /// The in-flight ticket.
        ticket: String,
    },
    /// A detection request failed.
    DetectionFailed {
        /// The settled ticket.
        ticket: String,
        /// Failure message.
        reason: String,
    },
    /// A command was refused.
    CommandFailed {
        /// Name of the command.
        command: &'static str,
        /// Error message.
        message: String,
    },
}

enum SessionCommand {
    AddBatch {
        elements: Vec<UIElement>,
        reply: oneshot::Sender<RaterResult<usize>>,
    },
    AddRects {
        rects: Vec<(f64, f64, f64, f64)>,
        reply: oneshot::Sender<RaterResult<usize>>,
    },
    RemoveElement {
        element: UIElement,
        reply: oneshot::Sender<bool>,
    },
    Annotate {
        element: UIElement,
        text: String,
        reply: oneshot::Sender<RaterResult<()>>,
    },
    Undo {
        reply: oneshot::Sender<usize>,
    },
    CurrentElements {
        reply: oneshot::Sender<Vec<UIElement>>,
    },
    ElementAt {
        x: f64,
        y: f64,
        reply: oneshot::Sender<Option<UIElement>>,
    },
    BeginGesture {
        point: Point,
        reply: oneshot::Sender<RaterResult<()>>,
    },
    UpdateGesture {
        point: Point,
        reply: oneshot::Sender<RaterResult<()>>,
    },
    EndGesture {
        point: Point,
        reply: oneshot::Sender<RaterResult<UIElement>>,
    },
    CancelGesture {
        reply: oneshot::Sender<bool>,
    },
    BeginDetection {
        reply: oneshot::Sender<RaterResult<DetectionTicket>>,
    },
    CompleteDetection {
        ticket: DetectionTicket,
        detection: Detection,
        reply: oneshot::Sender<RaterResult<DetectionOutcome>>,
    },
    FailDetection {
        ticket: DetectionTicket,
        reason: String,
        reply: oneshot::Sender<RaterResult<()>>,
    },
    Submission {
        reply: oneshot::Sender<RaterResult<RatingRequest>>,
    },
}

/// Cloneable handle to a running session actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl SessionCommand {
    const fn name(&self) -> &'static str {
        match self {
            Self::AddBatch { .. } => "add_batch",
            Self::AddRects { .. } => "add_rects",
            Self::RemoveElement { .. } => "remove_element",
            Self::Annotate { .. } => "annotate",
            Self::Undo { .. } => "undo",
            Self::CurrentElements { .. } => "current_elements",
            Self::ElementAt { .. } => "element_at",
            Self::BeginGesture { .. } => "begin_gesture",
            Self::UpdateGesture { .. } => "update_gesture",
            Self::EndGesture { .. } => "end_gesture",
            Self::CancelGesture { .. } => "cancel_gesture",
            Self::BeginDetection { .. } => "begin_detection",
            Self::CompleteDetection { .. } => "complete_detection",
            Self::FailDetection { .. } => "fail_detection",
            Self::Submission { .. } => "submission",
        }
    }
}

/// Move `session` into an actor task.
///
/// The actor stops when every [`SessionHandle`] is dropped; the join handle
/// then yields the final session.
#[must_use]
pub fn spawn_session(
    session: AnnotationSession,
    config: &RaterConfig,
) -> (SessionHandle, JoinHandle<AnnotationSession>) {
    let (commands, receiver) = mpsc::channel(config.queue_capacity.max(1));
    let (events, _) = broadcast::channel(config.status_capacity.max(1));
    let actor = SessionActor {
        session,
        events: events.clone(),
    };
    let join = tokio::spawn(actor.run(receiver));
    (SessionHandle { commands, events }, join)
}

struct SessionActor {
    session: AnnotationSession,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionActor {
    async fn run(mut self, mut receiver: mpsc::Receiver<SessionCommand>) -> AnnotationSession {
        tracing::info!("Session actor started");
        while let Some(command) = receiver.recv().await {
            tracing::trace!("Session command: {command:?}");
            self.handle(command);
        }
        tracing::info!("Session actor stopped");
        self.session
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn report<T>(&self, command: &'static str, result: &RaterResult<T>) {
        if let Err(e) = result {
            tracing::debug!("{command} refused: {e}");
            self.publish(SessionEvent::CommandFailed {
                command,
                message: e.to_string(),
            });
        }
    }

    fn appended(&self, origin: BatchOrigin, count: usize) {
        self.publish(SessionEvent::BatchAppended {
            origin,
            count,
            depth: self.session.depth(),
        });
    }

    #[allow(clippy::too_many_lines)]
    fn handle(&mut self, command: SessionCommand) {
        let name = command.name();
        match command {
            SessionCommand::AddBatch { elements, reply } => {
                let result = self.session.add_batch(elements);
                if let Ok(count) = result {
                    self.appended(BatchOrigin::Manual, count);
                }
                self.report(name, &result);
                let _ = reply.send(result);
            }
            SessionCommand::AddRects { rects, reply } => {
                let draft = BatchDraft::from_rects(rects);
                if draft.rejected > 0 {
                    self.publish(SessionEvent::ElementsRejected {
                        count: draft.rejected,
                    });
                }
                let result = self.session.add_batch(draft.elements);
                if let Ok(count) = result {
                    self.appended(BatchOrigin::Manual, count);
                }
                self.report(name, &result);
                let _ = reply.send(result);
            }
            SessionCommand::RemoveElement { element, reply } => {
                let removed = self.session.remove_element(&element);
                if removed {
                    self.publish(SessionEvent::ElementRemoved { element });
                }
                let _ = reply.send(removed);
            }
            SessionCommand::Annotate {
                element,
                text,
                reply,
            } => {
                let annotated = element.clone().with_annotation(text.clone());
                let result = self.session.annotate(&element, text);
                if result.is_ok() {
                    self.publish(SessionEvent::ElementAnnotated { element: annotated });
                }
                self.report(name, &result);
                let _ = reply.send(result);
            }
            SessionCommand::Undo { reply } => {
                if self.session.depth() == 0 {
                    self.publish(SessionEvent::DismissRequested);
                    let _ = reply.send(0);
                } else {
                    let removed = self.session.undo();
                    self.publish(SessionEvent::Undone {
                        removed,
                        depth: self.session.depth(),
                    });
                    let _ = reply.send(removed);
                }
            }
            SessionCommand::CurrentElements { reply } => {
                let _ = reply.send(self.session.current_elements());
            }
            SessionCommand::ElementAt { x, y, reply } => {
                let _ = reply.send(self.session.element_at(x, y).cloned());
            }
            SessionCommand::BeginGesture { point, reply } => {
                let result = self.session.begin_gesture(point);
                self.report(name, &result);
                let _ = reply.send(result);
            }
            SessionCommand::UpdateGesture { point, reply } => {
                let result = self.session.update_gesture(point);
                self.report(name, &result);
                let _ = reply.send(result);
            }
            SessionCommand::EndGesture { point, reply } => {
                let result = self.session.end_gesture(point);
                if result.is_ok() {
                    self.appended(BatchOrigin::Manual, 1);
                }
                self.report(name, &result);
                let _ = reply.send(result);
            }
            SessionCommand::CancelGesture { reply } => {
                let _ = reply.send(self.session.cancel_gesture());
            }
            SessionCommand::BeginDetection { reply } => {
                let result = self.session.begin_detection();
                if let Ok(ticket) = result {
                    self.publish(SessionEvent::DetectionStarted {
                        ticket: ticket.to_string(),
                    });
                }
                self.report(name, &result);
                let _ = reply.send(result);
            }
            SessionCommand::CompleteDetection {
                ticket,
                detection,
                reply,
            } => {
                let result = self.session.complete_detection(ticket, &detection);
                if let Ok(outcome) = &result {
                    if outcome.discarded + outcome.rejected > 0 {
                        tracing::debug!(
                            "Detection {ticket} dropped {} noisy and {} invalid box(es)",
                            outcome.discarded,
                            outcome.rejected
                        );
                    }
                    if outcome.rejected > 0 {
                        self.publish(SessionEvent::ElementsRejected {
                            count: outcome.rejected,
                        });
                    }
                    if outcome.appended > 0 {
                        self.appended(BatchOrigin::Detected, outcome.appended);
                    }
                }
                self.report(name, &result);
                let _ = reply.send(result);
            }
            SessionCommand::FailDetection {
                ticket,
                reason,
                reply,
            } => {
                let result = self.session.fail_detection(ticket, &reason);
                if result.is_ok() {
                    self.publish(SessionEvent::DetectionFailed {
                        ticket: ticket.to_string(),
                        reason,
                    });
                }
                self.report(name, &result);
                let _ = reply.send(result);
            }
            SessionCommand::Submission { reply } => {
                let result = self.session.submission();
                self.report(name, &result);
                let _ = reply.send(result);
            }
        }
    }
}

impl SessionHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> RaterResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| RaterError::SessionClosed)?;
        response.await.map_err(|_| RaterError::SessionClosed)
    }

    /// Subscribe to status reports.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Append validated elements as a manual batch.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::EmptyBatch`] for an empty batch, or
    /// [`RaterError::SessionClosed`] if the actor is gone.
    pub async fn add_batch(&self, elements: Vec<UIElement>) -> RaterResult<usize> {
        self.request(|reply| SessionCommand::AddBatch { elements, reply })
            .await?
    }

    /// Validate `(x, y, width, height)` rectangles and append the valid ones.
    ///
    /// Invalid rectangles are reported as [`SessionEvent::ElementsRejected`].
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::EmptyBatch`] if no rectangle is valid.
    pub async fn add_rects(&self, rects: Vec<(f64, f64, f64, f64)>) -> RaterResult<usize> {
        self.request(|reply| SessionCommand::AddRects { rects, reply })
            .await?
    }

    /// Remove the most recent element equal to `element`.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::SessionClosed`] if the actor is gone.
    pub async fn remove_element(&self, element: UIElement) -> RaterResult<bool> {
        self.request(|reply| SessionCommand::RemoveElement { element, reply })
            .await
    }

    /// Attach `text` to the element equal to `element`.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::ElementNotFound`] if no element matches.
    pub async fn annotate(&self, element: UIElement, text: impl Into<String>) -> RaterResult<()> {
        let text = text.into();
        self.request(|reply| SessionCommand::Annotate {
            element,
            text,
            reply,
        })
        .await?
    }

    /// Undo the newest batch.
    ///
    /// On an empty history nothing changes and
    /// [`SessionEvent::DismissRequested`] is published.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::SessionClosed`] if the actor is gone.
    pub async fn undo(&self) -> RaterResult<usize> {
        self.request(|reply| SessionCommand::Undo { reply }).await
    }

    /// All live elements.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::SessionClosed`] if the actor is gone.
    pub async fn current_elements(&self) -> RaterResult<Vec<UIElement>> {
        self.request(|reply| SessionCommand::CurrentElements { reply })
            .await
    }

    /// The newest element containing the normalized point.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::SessionClosed`] if the actor is gone.
    pub async fn element_at(&self, x: f64, y: f64) -> RaterResult<Option<UIElement>> {
        self.request(|reply| SessionCommand::ElementAt { x, y, reply })
            .await
    }

    /// Start a drag gesture.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] if a drag is already active.
    pub async fn begin_gesture(&self, point: Point) -> RaterResult<()> {
        self.request(|reply| SessionCommand::BeginGesture { point, reply })
            .await?
    }

    /// Move the drag's current corner.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] if no drag is active.
    pub async fn update_gesture(&self, point: Point) -> RaterResult<()> {
        self.request(|reply| SessionCommand::UpdateGesture { point, reply })
            .await?
    }

    /// Finish the drag and append its element.
    ///
    /// # Errors
    ///
    /// See [`AnnotationSession::end_gesture`].
    pub async fn end_gesture(&self, point: Point) -> RaterResult<UIElement> {
        self.request(|reply| SessionCommand::EndGesture { point, reply })
            .await?
    }

    /// Abandon the drag.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::SessionClosed`] if the actor is gone.
    pub async fn cancel_gesture(&self) -> RaterResult<bool> {
        self.request(|reply| SessionCommand::CancelGesture { reply })
            .await
    }

    /// Record a detection request issued elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] if one is already in flight.
    pub async fn begin_detection(&self) -> RaterResult<DetectionTicket> {
        self.request(|reply| SessionCommand::BeginDetection { reply })
            .await?
    }

    /// Enqueue a finished detection pass.
    ///
    /// # Errors
    ///
    /// See [`AnnotationSession::complete_detection`].
    pub async fn complete_detection(
        &self,
        ticket: DetectionTicket,
        detection: Detection,
    ) -> RaterResult<DetectionOutcome> {
        self.request(|reply| SessionCommand::CompleteDetection {
            ticket,
            detection,
            reply,
        })
        .await?
    }

    /// Enqueue a detection failure.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] for a stale ticket.
    pub async fn fail_detection(
        &self,
        ticket: DetectionTicket,
        reason: impl Into<String>,
    ) -> RaterResult<()> {
        let reason = reason.into();
        self.request(|reply| SessionCommand::FailDetection {
            ticket,
            reason,
            reply,
        })
        .await?
    }

    /// Run `detector` on `image` in the background.
    ///
    /// The request is registered through the queue first. The returned join
    /// handle resolves once the result has been applied to the session; a
    /// detector error settles the ticket as failed and is returned as
    /// [`RaterError::Detection`].
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InvalidTransition`] if a detection is already in
    /// flight.
    pub async fn detect(
        &self,
        detector: Arc<dyn RegionDetector>,
        image: Vec<u8>,
    ) -> RaterResult<(DetectionTicket, JoinHandle<RaterResult<DetectionOutcome>>)> {
        let ticket = self.begin_detection().await?;
        let handle = self.clone();
        let task = tokio::spawn(async move {
            match detector.detect(&image).await {
                Ok(detection) => handle.complete_detection(ticket, detection).await,
                Err(e) => {
                    let reason = e.to_string();
                    handle.fail_detection(ticket, reason.clone()).await?;
                    Err(RaterError::Detection(reason))
                }
            }
        });
        Ok((ticket, task))
    }

    /// Shape the scoring request for the current elements.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::InsufficientInput`] when too few elements are
    /// live.
    pub async fn submission(&self) -> RaterResult<RatingRequest> {
        self.request(|reply| SessionCommand::Submission { reply })
            .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::RawBox;
    use crate::Canvas;
    use async_trait::async_trait;

    fn start() -> (SessionHandle, JoinHandle<AnnotationSession>) {
        let canvas = Canvas::new(400.0, 800.0).expect("canvas");
        spawn_session(AnnotationSession::new(canvas), &RaterConfig::default())
    }

    fn el(x: f64, y: f64) -> UIElement {
        UIElement::new(x, y, 0.1, 0.1).expect("valid")
    }

    struct FixedDetector(Vec<RawBox>);

    #[async_trait]
    impl RegionDetector for FixedDetector {
        async fn detect(&self, _image: &[u8]) -> RaterResult<Detection> {
            Ok(Detection {
                boxes: self.0.clone(),
                transform_height: 1.0,
            })
        }
    }

    struct BrokenDetector;

    #[async_trait]
    impl RegionDetector for BrokenDetector {
        async fn detect(&self, _image: &[u8]) -> RaterResult<Detection> {
            Err(RaterError::Detection("model unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_commands_apply_in_order() {
        let (handle, join) = start();
        handle.add_batch(vec![el(0.1, 0.1)]).await.expect("add");
        handle
            .add_batch(vec![el(0.3, 0.3), el(0.5, 0.5)])
            .await
            .expect("add");
        assert_eq!(handle.undo().await.expect("undo"), 2);
        assert_eq!(handle.current_elements().await.expect("list"), vec![el(0.1, 0.1)]);
        drop(handle);
        let session = join.await.expect("join");
        assert_eq!(session.depth(), 1);
    }

    #[tokio::test]
    async fn test_undo_on_empty_requests_dismiss() {
        let (handle, _join) = start();
        let mut events = handle.subscribe();
        assert_eq!(handle.undo().await.expect("undo"), 0);
        assert_eq!(events.recv().await.expect("event"), SessionEvent::DismissRequested);
    }

    #[tokio::test]
    async fn test_add_rects_reports_rejections() {
        let (handle, _join) = start();
        let mut events = handle.subscribe();
        let count = handle
            .add_rects(vec![(0.1, 0.1, 0.2, 0.2), (1.5, 0.1, 0.2, 0.2)])
            .await
            .expect("add");
        assert_eq!(count, 1);
        assert_eq!(
            events.recv().await.expect("event"),
            SessionEvent::ElementsRejected { count: 1 }
        );
        assert!(matches!(
            events.recv().await.expect("event"),
            SessionEvent::BatchAppended { count: 1, depth: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_errors_are_reported_on_the_status_channel() {
        let (handle, _join) = start();
        let mut events = handle.subscribe();
        let result = handle.add_batch(Vec::new()).await;
        assert!(matches!(result, Err(RaterError::EmptyBatch)));
        assert!(matches!(
            events.recv().await.expect("event"),
            SessionEvent::CommandFailed { command: "add_batch", .. }
        ));
    }

    #[tokio::test]
    async fn test_detect_appends_one_batch() {
        let (handle, _join) = start();
        handle.add_batch(vec![el(0.1, 0.1)]).await.expect("add");
        let detector = Arc::new(FixedDetector(vec![
            RawBox::new(0.1, 0.9, 0.2, 0.1),
            RawBox::new(0.4, 0.9, 0.2, 0.1),
            RawBox::new(0.7, 0.9, 0.2, 0.1),
            RawBox::new(0.7, 0.5, 0.001, 0.1),
        ]));
        let (_ticket, task) = handle.detect(detector, vec![0u8; 4]).await.expect("detect");
        let outcome = task.await.expect("join").expect("outcome");
        assert_eq!(outcome.appended, 3);
        assert_eq!(outcome.discarded, 1);
        assert_eq!(handle.current_elements().await.expect("list").len(), 4);
        assert_eq!(handle.undo().await.expect("undo"), 3);
        assert_eq!(handle.current_elements().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_detect_failure_settles_ticket() {
        let (handle, _join) = start();
        let mut events = handle.subscribe();
        let (ticket, task) = handle
            .detect(Arc::new(BrokenDetector), Vec::new())
            .await
            .expect("detect");
        let result = task.await.expect("join");
        assert!(matches!(result, Err(RaterError::Detection(_))));
        assert_eq!(
            events.recv().await.expect("event"),
            SessionEvent::DetectionStarted {
                ticket: ticket.to_string()
            }
        );
        assert!(matches!(
            events.recv().await.expect("event"),
            SessionEvent::DetectionFailed { .. }
        ));
        // A new detection may start once the failed one is settled.
        handle.begin_detection().await.expect("second detection");
    }

    #[tokio::test]
    async fn test_second_detection_while_in_flight_is_refused() {
        let (handle, _join) = start();
        handle.begin_detection().await.expect("first");
        let result = handle.begin_detection().await;
        assert!(matches!(result, Err(RaterError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_gesture_through_handle() {
        let (handle, _join) = start();
        handle.begin_gesture(Point::new(40.0, 80.0)).await.expect("begin");
        handle.update_gesture(Point::new(100.0, 100.0)).await.expect("update");
        let element = handle.end_gesture(Point::new(120.0, 160.0)).await.expect("end");
        assert!((element.width() - 0.2).abs() < 1e-9);
        assert_eq!(
            handle.element_at(0.15, 0.15).await.expect("hit"),
            Some(element)
        );
    }

    #[tokio::test]
    async fn test_submission_requires_two_elements() {
        let (handle, _join) = start();
        handle.add_batch(vec![el(0.1, 0.1)]).await.expect("add");
        assert!(matches!(
            handle.submission().await,
            Err(RaterError::InsufficientInput { found: 1, required: 2 })
        ));
        handle.add_batch(vec![el(0.5, 0.5)]).await.expect("add");
        assert_eq!(handle.submission().await.expect("request").items.len(), 2);
    }

    #[tokio::test]
    async fn test_closed_session() {
        let (handle, join) = start();
        join.abort();
        let _ = join.await;
        assert!(matches!(handle.undo().await, Err(RaterError::SessionClosed)));
    }
}
