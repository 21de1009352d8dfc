//! Wire documents exchanged with the scoring collaborator and used for
//! session snapshots.

use serde::{Deserialize, Serialize};

use crate::session::Batch;
use crate::{Canvas, UIElement};

/// Payload the scoring service accepts.
///
/// ```json
/// {"items": [{"x": 0.1, "y": 0.2, "width": 0.3, "height": 0.1}],
///  "canvas": {"width": 390.0, "height": 844.0}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRequest {
    /// Elements to be rated.
    pub items: Vec<UIElement>,
    /// The canvas the items belong to.
    pub canvas: Canvas,
}

/// Snapshot of a session's batch history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    /// Canvas the session annotates.
    pub canvas: Canvas,
    /// Batches in contribution order.
    pub batches: Vec<Batch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = RatingRequest {
            items: vec![UIElement::new(0.1, 0.2, 0.3, 0.1).expect("valid")],
            canvas: Canvas::new(390.0, 844.0).expect("canvas"),
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["items"][0]["width"], 0.3);
        assert_eq!(json["canvas"]["height"], 844.0);
        assert!(json.get("elements").is_none());
    }

    #[test]
    fn test_request_rejects_invalid_items() {
        let json = r#"{"items": [{"x": 2.0, "y": 0.0, "width": 0.1, "height": 0.1}],
                       "canvas": {"width": 10.0, "height": 10.0}}"#;
        assert!(serde_json::from_str::<RatingRequest>(json).is_err());
    }
}
