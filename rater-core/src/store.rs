//! Shared rating storage.
//!
//! Provides a thread-safe [`RatingStore`] that keeps saved ratings in memory
//! and, when given a data directory, mirrors each one to `<id>.json`. The
//! store is the source of ratings for the consistency scorer and the sink for
//! ratings returned by the scoring service.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{RaterError, RaterResult, Rating, Rgb, UIElement};

/// Unique identifier for a stored rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RatingId(Uuid);

impl RatingId {
    /// Create a new unique rating ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a rating ID from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::RatingNotFound`] if `s` is not a UUID.
    pub fn parse(s: &str) -> RaterResult<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| RaterError::RatingNotFound(s.to_string()))
    }
}

impl Default for RatingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RatingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display metadata attached to a rating when it is saved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingMetadata {
    /// Display name.
    pub name: String,
    /// Reference to the rated screenshot.
    pub image_path: Option<String>,
    /// Average colour of the rated screenshot.
    pub main_color: Option<Rgb>,
    /// Elements that produced the rating.
    pub elements: Vec<UIElement>,
}

/// A rating as kept by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRating {
    /// Store identifier.
    pub id: RatingId,
    /// The rating with its bookkeeping fields filled in.
    pub rating: Rating,
}

/// Thread-safe rating storage with optional filesystem persistence.
#[derive(Debug, Clone, Default)]
pub struct RatingStore {
    ratings: Arc<RwLock<HashMap<RatingId, Rating>>>,
    data_dir: Option<PathBuf>,
}

impl RatingStore {
    /// Create an in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that persists into `data_dir`.
    ///
    /// The directory is created if it doesn't exist. Existing files are not
    /// loaded until [`Self::load_all_from_disk`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::Io`] if the directory cannot be created.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> RaterResult<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            ratings: Arc::new(RwLock::new(HashMap::new())),
            data_dir: Some(data_dir),
        })
    }

    /// Save a rating, stamping its bookkeeping fields from `metadata`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rating cannot be written to the data directory.
    /// The rating stays in memory in that case.
    pub fn add(&self, mut rating: Rating, metadata: RatingMetadata) -> RaterResult<RatingId> {
        rating.name = Some(metadata.name);
        rating.created_at_ms = Some(current_timestamp_ms());
        rating.image_path = metadata.image_path;
        rating.main_color = metadata.main_color;
        rating.elements = metadata.elements;

        let id = RatingId::new();
        {
            let mut ratings = self
                .ratings
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            ratings.insert(id, rating.clone());
        }
        self.persist(id, &rating)?;
        tracing::info!("Stored rating {id}");
        Ok(id)
    }

    /// Get a rating by ID.
    #[must_use]
    pub fn get(&self, id: RatingId) -> Option<Rating> {
        let ratings = self
            .ratings
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        ratings.get(&id).cloned()
    }

    /// All ratings, newest first.
    #[must_use]
    pub fn list(&self) -> Vec<StoredRating> {
        let ratings = self
            .ratings
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut entries: Vec<StoredRating> = ratings
            .iter()
            .map(|(id, rating)| StoredRating {
                id: *id,
                rating: rating.clone(),
            })
            .collect();
        entries.sort_by(|a, b| {
            b.rating
                .created_at_ms
                .cmp(&a.rating.created_at_ms)
                .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
        });
        entries
    }

    /// Ratings for the given IDs, in the order requested.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::RatingNotFound`] for the first unknown ID.
    pub fn select(&self, ids: &[RatingId]) -> RaterResult<Vec<Rating>> {
        let ratings = self
            .ratings
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        ids.iter()
            .map(|id| {
                ratings
                    .get(id)
                    .cloned()
                    .ok_or_else(|| RaterError::RatingNotFound(id.to_string()))
            })
            .collect()
    }

    /// Remove a rating and its file.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::RatingNotFound`] if the rating does not exist.
    pub fn remove(&self, id: RatingId) -> RaterResult<Rating> {
        let removed = {
            let mut ratings = self
                .ratings
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            ratings
                .remove(&id)
                .ok_or_else(|| RaterError::RatingNotFound(id.to_string()))?
        };
        self.delete_file(id);
        Ok(removed)
    }

    /// Number of stored ratings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ratings
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn persist(&self, id: RatingId, rating: &Rating) -> RaterResult<()> {
        let Some(ref data_dir) = self.data_dir else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&StoredRating {
            id,
            rating: rating.clone(),
        })?;
        std::fs::write(data_dir.join(format!("{id}.json")), json)?;
        Ok(())
    }

    fn delete_file(&self, id: RatingId) {
        let Some(ref data_dir) = self.data_dir else {
            return;
        };
        let path = data_dir.join(format!("{id}.json"));
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to delete rating file {}: {e}", path.display());
            }
        }
    }

    /// Load every `*.json` rating in the data directory into memory.
    ///
    /// Files that fail to parse are skipped with a warning. Returns the IDs
    /// that were loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory is configured or it can't be read.
    pub fn load_all_from_disk(&self) -> RaterResult<Vec<RatingId>> {
        let data_dir = self
            .data_dir
            .as_ref()
            .ok_or_else(|| RaterError::Io(std::io::Error::other("no data directory configured")))?;
        let mut loaded = Vec::new();
        for entry in std::fs::read_dir(data_dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(RaterError::from)
                .and_then(|contents| {
                    serde_json::from_str::<StoredRating>(&contents).map_err(RaterError::from)
                });
            match parsed {
                Ok(stored) => {
                    let mut ratings = self
                        .ratings
                        .write()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    ratings.insert(stored.id, stored.rating);
                    loaded.push(stored.id);
                }
                Err(e) => tracing::warn!("Skipping {}: {e}", path.display()),
            }
        }
        tracing::debug!("Loaded {} rating(s) from {}", loaded.len(), data_dir.display());
        Ok(loaded)
    }
}

/// Get the current Unix timestamp in milliseconds.
fn current_timestamp_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| {
        // Timestamp will not exceed u64 max for millennia
        #[allow(clippy::cast_possible_truncation)]
        {
            d.as_millis() as u64
        }
    })
}
