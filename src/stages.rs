//!
//! src/stages.rs
//!
//! The three pipeline operations and the sequential runner that chains
//! them. Stages exchange record lists only through the handoff store,
//! so each one can also be driven standalone by an external scheduler
//!

use tracing::{error, info};

use crate::config::EtlConfig;
use crate::fetch::{self, SpotifyClient};
use crate::handoff::{Handoff, Stage};
use crate::persistent::Persistent;
use crate::types::TrackRecord;
use crate::EtlError;

/// Written by the extractor, read by the transformer
pub const EXTRACT_KEY: &str = "spotify_tracks";
/// Written by the transformer, read by the loader
pub const TRANSFORM_KEY: &str = "transformed_tracks";

/// Authenticate, search the catalog, and hand off one flat record per
/// result item. Either the full page lands in the handoff store or the
/// stage fails entirely; auth and network failures propagate to the
/// caller's retry policy.
pub async fn extract(
    client: &SpotifyClient,
    etl: &EtlConfig,
    handoff: &impl Handoff
) -> Result<usize, EtlError> {
    let token = client.request_token().await?;
    let results = client.search_tracks(
        &etl.search_query,
        etl.search_limit,
        &token.access_token
    ).await?;

    let tracks = fetch::tracks_from_search(&results)?;
    handoff.put(Stage::Extract, EXTRACT_KEY, &tracks)?;

    info!(
        stage = Stage::Extract.as_str(),
        query = %etl.search_query,
        count = tracks.len(),
        "etl.extract.done"
    );
    Ok(tracks.len())
}

/// Keep the records whose popularity strictly exceeds the threshold,
/// preserving relative order
pub fn filter_by_popularity(tracks: Vec<TrackRecord>, threshold: i64)
    -> Vec<TrackRecord> {
    tracks.into_iter()
        .filter(|track| track.popularity > threshold)
        .collect()
}

/// Read the extractor's list, filter it, and hand off the survivors.
/// An empty input list is an empty output, not an error; a missing
/// input key is fatal.
pub fn transform(etl: &EtlConfig, handoff: &impl Handoff)
    -> Result<usize, EtlError> {
    let tracks: Vec<TrackRecord> = handoff.get(Stage::Extract, EXTRACT_KEY)?;
    let before = tracks.len();

    let kept = filter_by_popularity(tracks, etl.popularity_threshold);
    handoff.put(Stage::Transform, TRANSFORM_KEY, &kept)?;

    info!(
        stage = Stage::Transform.as_str(),
        threshold = etl.popularity_threshold,
        input = before,
        kept = kept.len(),
        "etl.transform.done"
    );
    Ok(kept.len())
}

/// Read the transformer's list and persist one row per record,
/// committing once. A database failure is logged and returned to the
/// caller so its retry policy can act, rather than reporting false
/// success.
pub async fn load(db: &Persistent, handoff: &impl Handoff)
    -> Result<u64, EtlError> {
    let tracks: Vec<TrackRecord> = handoff.get(Stage::Transform, TRANSFORM_KEY)?;

    match db.insert_tracks(&tracks).await {
        Ok(rows) => {
            info!(stage = Stage::Load.as_str(), rows, "etl.load.done");
            Ok(rows)
        }
        Err(e) => {
            error!(stage = Stage::Load.as_str(), error = %e, "etl.load.failed");
            Err(e)
        }
    }
}

/// Strictly sequential extract -> transform -> load; the in-process
/// equivalent of the scheduler's dependency chain. Returns the number
/// of rows loaded.
pub async fn run_pipeline(
    client: &SpotifyClient,
    etl: &EtlConfig,
    db: &Persistent,
    handoff: &impl Handoff
) -> Result<u64, EtlError> {
    extract(client, etl, handoff).await?;
    transform(etl, handoff)?;
    load(db, handoff).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::MemoryHandoff;

    fn track(name: &str, popularity: i64) -> TrackRecord {
        TrackRecord {
            track_name: name.to_string(),
            artist_name: "Taylor Swift".to_string(),
            popularity,
        }
    }

    fn etl_config(threshold: i64) -> EtlConfig {
        EtlConfig {
            search_query: "Taylor Swift".to_string(),
            search_limit: 10,
            popularity_threshold: threshold,
        }
    }

    #[test]
    fn filter_keeps_strictly_greater_and_preserves_order() {
        let tracks = vec![
            track("Love Story", 80),
            track("Edge Case", 50),
            track("Obscure B-Side", 20),
            track("Anti-Hero", 95),
        ];

        let kept = filter_by_popularity(tracks, 50);
        let names: Vec<&str> =
            kept.iter().map(|t| t.track_name.as_str()).collect();
        assert_eq!(names, ["Love Story", "Anti-Hero"]);
    }

    #[test]
    fn filter_is_idempotent_on_its_own_output() {
        let tracks = vec![
            track("Love Story", 80),
            track("Obscure B-Side", 20),
        ];

        let once = filter_by_popularity(tracks, 50);
        let twice = filter_by_popularity(once.clone(), 50);
        assert_eq!(once, twice);
    }

    #[test]
    fn transform_filters_the_extract_handoff() -> Result<(), EtlError> {
        let handoff = MemoryHandoff::new();
        handoff.put(Stage::Extract, EXTRACT_KEY, &vec![
            track("Love Story", 80),
            track("Obscure B-Side", 20),
        ])?;

        let kept = transform(&etl_config(50), &handoff)?;
        assert_eq!(kept, 1);

        let out: Vec<TrackRecord> =
            handoff.get(Stage::Transform, TRANSFORM_KEY)?;
        assert_eq!(out, vec![track("Love Story", 80)]);
        Ok(())
    }

    #[test]
    fn transform_of_empty_input_is_empty_not_an_error() ->
        Result<(), EtlError> {
        let handoff = MemoryHandoff::new();
        handoff.put(Stage::Extract, EXTRACT_KEY, &Vec::<TrackRecord>::new())?;

        assert_eq!(transform(&etl_config(50), &handoff)?, 0);

        let out: Vec<TrackRecord> =
            handoff.get(Stage::Transform, TRANSFORM_KEY)?;
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn transform_without_extract_output_is_fatal() {
        let handoff = MemoryHandoff::new();
        let result = transform(&etl_config(50), &handoff);
        assert!(matches!(result, Err(EtlError::NotFound(_))));
    }

    #[tokio::test]
    async fn load_persists_the_transform_handoff() -> Result<(), EtlError> {
        let handoff = MemoryHandoff::new();
        handoff.put(Stage::Transform, TRANSFORM_KEY, &vec![
            track("Love Story", 80),
        ])?;

        let db = Persistent::init("sqlite::memory:").await?;
        assert_eq!(load(&db, &handoff).await?, 1);
        assert_eq!(db.count_tracks().await?, 1);

        // a second invocation appends duplicates, no dedup
        assert_eq!(load(&db, &handoff).await?, 1);
        assert_eq!(db.count_tracks().await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn load_of_empty_list_commits_zero_rows() -> Result<(), EtlError> {
        let handoff = MemoryHandoff::new();
        handoff.put(
            Stage::Transform, TRANSFORM_KEY, &Vec::<TrackRecord>::new()
        )?;

        let db = Persistent::init("sqlite::memory:").await?;
        assert_eq!(load(&db, &handoff).await?, 0);
        assert_eq!(db.count_tracks().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn load_without_transform_output_is_fatal() ->
        Result<(), EtlError> {
        let handoff = MemoryHandoff::new();
        let db = Persistent::init("sqlite::memory:").await?;

        let result = load(&db, &handoff).await;
        assert!(matches!(result, Err(EtlError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn transform_then_load_chain() -> Result<(), EtlError> {
        let handoff = MemoryHandoff::new();
        handoff.put(Stage::Extract, EXTRACT_KEY, &vec![
            track("Love Story", 80),
            track("Edge Case", 50),
            track("Anti-Hero", 95),
        ])?;

        let etl = etl_config(50);
        transform(&etl, &handoff)?;

        let db = Persistent::init("sqlite::memory:").await?;
        assert_eq!(load(&db, &handoff).await?, 2);
        assert_eq!(db.count_tracks().await?, 2);
        Ok(())
    }
}
