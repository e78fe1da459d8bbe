//! Storage module
//!
//! History and favorites persistence for generated content, plus the
//! in-memory user / fitness store behind the account backend.

pub mod file;
pub mod history;
pub mod users;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use file::FileStore;
pub use history::{Favorite, FavoriteStore, HistoryRecord, HistoryStore, MemoryStore};
pub use users::{EntryFilter, MemoryUserStore, UserStore};

/// Upper bound (exclusive) for generated record identifiers
pub const RECORD_ID_SPACE: u64 = 1_000_000_000;

/// Identifier of a persisted generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Draw a fresh random identifier
    pub fn random() -> Self {
        RecordId(rand::thread_rng().gen_range(0..RECORD_ID_SPACE))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(RecordId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids_stay_in_range() {
        for _ in 0..1000 {
            assert!(RecordId::random().0 < RECORD_ID_SPACE);
        }
    }

    #[test]
    fn test_parse_and_display() {
        let id: RecordId = " 42 ".parse().unwrap();
        assert_eq!(id, RecordId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&RecordId(7)).unwrap(), "7");
    }
}
