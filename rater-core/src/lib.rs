//! # Rater Core
//!
//! Core logic for rating the visual design of app screenshots: collecting the
//! UI elements of a screenshot, reconciling machine-detected regions, and
//! measuring how consistent the scoring heuristics are across ratings.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 rater-core                  │
//! ├─────────────────────────────────────────────┤
//! │  Annotation      │  Detection               │
//! │  - Batch history │  - De-noising            │
//! │  - Undo          │  - Origin flip           │
//! │  - Gestures      │  - Normalization         │
//! ├─────────────────────────────────────────────┤
//! │  Session Actor   │  Consistency Scorer      │
//! │  - Serial queue  │  - Common metric types   │
//! │  - Status events │  - Relative std dev      │
//! ├─────────────────────────────────────────────┤
//! │  Rating Store    │  Collaborator traits     │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actor;
pub mod boundary;
pub mod config;
pub mod consistency;
pub mod detection;
pub mod element;
pub mod error;
pub mod menu;
pub mod rating;
pub mod schema;
pub mod session;
pub mod store;

pub use actor::{spawn_session, SessionEvent, SessionHandle};
pub use boundary::{rate_and_save, RatingService, RatingSink, RatingSource, RegionDetector};
pub use config::RaterConfig;
pub use consistency::{
    compute_consistency, consistency_report, ConsistencyReport, MetricSpread,
    UndefinedConsistency,
};
pub use detection::{reconcile_detected_regions, Detection, RawBox, Reconciliation};
pub use element::{Canvas, Point, UIElement};
pub use error::{RaterError, RaterResult};
pub use menu::{MenuAction, MenuPresenter};
pub use rating::{Metric, MetricGroup, MetricType, Rating, Rgb};
pub use schema::{RatingRequest, SessionDocument};
pub use session::{
    AnnotationSession, Batch, BatchDraft, BatchOrigin, DetectionOutcome, DetectionTicket,
};
pub use store::{RatingId, RatingMetadata, RatingStore, StoredRating};

/// Rater core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
