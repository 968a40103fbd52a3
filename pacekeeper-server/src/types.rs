//! Wire types shared by the HTTP and WebSocket surfaces

use serde::{Deserialize, Serialize};

/// One JSON frame sent to a WebSocket session client
///
/// ```json
/// {"count": 42}
/// {"error": "Your IP is being rate-limited, please stop!"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionFrame {
    Count { count: i64 },
    Error { error: String },
}

impl SessionFrame {
    pub fn count(count: i64) -> Self {
        SessionFrame::Count { count }
    }

    pub fn error(error: impl Into<String>) -> Self {
        SessionFrame::Error {
            error: error.into(),
        }
    }

    /// Serialized JSON text for this frame
    pub fn to_json(&self) -> String {
        // Both variants are plain maps of scalars
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_shapes() {
        assert_eq!(SessionFrame::count(7).to_json(), r#"{"count":7}"#);
        assert_eq!(
            SessionFrame::error("slow down").to_json(),
            r#"{"error":"slow down"}"#
        );
    }

    #[test]
    fn test_frame_parse() {
        let frame: SessionFrame = serde_json::from_str(r#"{"count": 3}"#).unwrap();
        assert_eq!(frame, SessionFrame::count(3));

        let frame: SessionFrame = serde_json::from_str(r#"{"error": "nope"}"#).unwrap();
        assert_eq!(frame, SessionFrame::error("nope"));
    }
}
