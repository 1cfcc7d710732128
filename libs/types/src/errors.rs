//! Error types for key and window parsing
//!
//! Both are boundary errors: a `KeyError` drops one snapshot entry during
//! ingestion, a `WindowError` rejects an analytics request before it reaches
//! the store.

use thiserror::Error;

/// A market key that does not decode into `venue:exchange:pair`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Malformed market key {key:?}: expected 3 segments, found {found}")]
    SegmentCount { key: String, found: usize },

    #[error("Malformed market key {key:?}: segment {position} is empty")]
    EmptySegment { key: String, position: usize },
}

impl KeyError {
    /// The offending raw key.
    pub fn key(&self) -> &str {
        match self {
            KeyError::SegmentCount { key, .. } => key,
            KeyError::EmptySegment { key, .. } => key,
        }
    }
}

/// A duration literal that does not describe a trailing window.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("Malformed duration: {0:?}")]
    Malformed(String),

    #[error("Duration out of range: {0:?}")]
    Overflow(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_count_display() {
        let err = KeyError::SegmentCount {
            key: "bad-key".to_string(),
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "Malformed market key \"bad-key\": expected 3 segments, found 1"
        );
        assert_eq!(err.key(), "bad-key");
    }

    #[test]
    fn test_window_error_display() {
        let err = WindowError::Malformed("yesterday".to_string());
        assert!(err.to_string().contains("yesterday"));
    }
}
