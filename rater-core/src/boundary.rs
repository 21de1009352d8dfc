//! Collaborator seams.
//!
//! The region detector and the scoring service live outside this crate. They
//! are modelled as async traits so the session actor can drive them without
//! knowing how they are implemented.

use async_trait::async_trait;

use crate::detection::Detection;
use crate::schema::RatingRequest;
use crate::store::{RatingId, RatingMetadata, RatingStore};
use crate::{RaterResult, Rating};

/// Finds candidate UI regions in a screenshot.
#[async_trait]
pub trait RegionDetector: Send + Sync {
    /// Detect regions in the encoded image.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::Detection`](crate::RaterError::Detection) when the
    /// detector cannot process the image.
    async fn detect(&self, image: &[u8]) -> RaterResult<Detection>;
}

/// Scores a set of elements.
#[async_trait]
pub trait RatingService: Send + Sync {
    /// Rate the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects or cannot process the request.
    async fn rate(&self, request: RatingRequest) -> RaterResult<Rating>;
}

/// Accepts ratings to keep.
pub trait RatingSink {
    /// Save a rating with its display metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the rating cannot be saved.
    fn save(&self, rating: Rating, metadata: RatingMetadata) -> RaterResult<RatingId>;
}

/// Supplies previously saved ratings.
pub trait RatingSource {
    /// Fetch ratings by ID, in the order given.
    ///
    /// # Errors
    ///
    /// Returns an error if any ID is unknown.
    fn fetch(&self, ids: &[RatingId]) -> RaterResult<Vec<Rating>>;
}

impl RatingSink for RatingStore {
    fn save(&self, rating: Rating, metadata: RatingMetadata) -> RaterResult<RatingId> {
        self.add(rating, metadata)
    }
}

impl RatingSource for RatingStore {
    fn fetch(&self, ids: &[RatingId]) -> RaterResult<Vec<Rating>> {
        self.select(ids)
    }
}

/// Rate the session's submission and save the result.
///
/// # Errors
///
/// Returns any error from the service or the sink. Nothing is saved when the
/// service fails.
pub async fn rate_and_save(
    request: RatingRequest,
    service: &dyn RatingService,
    sink: &dyn RatingSink,
    name: impl Into<String>,
) -> RaterResult<(RatingId, Rating)> {
    let elements = request.items.clone();
    let rating = service.rate(request).await?;
    let metadata = RatingMetadata {
        name: name.into(),
        elements,
        ..RatingMetadata::default()
    };
    let id = sink.save(rating.clone(), metadata)?;
    Ok((id, rating))
}
