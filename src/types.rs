use serde::{Deserialize, Serialize};

/// Flat record for one catalog track. All three fields are set at
/// extraction and never mutated; downstream stages either pass a record
/// through unchanged or drop it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track_name: String,
    pub artist_name: String,
    pub popularity: i64
}
