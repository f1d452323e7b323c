//! src/persistent.rs
//!
//! Defines module for persisting transformed track records to the
//! destination table
//!

use std::str::FromStr;

use sqlx::{Pool, Sqlite};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::types::TrackRecord;
use crate::EtlError;

pub struct Persistent {
    pool: Pool<Sqlite>
}

impl Persistent {
    pub async fn init(database_url: &str) -> Result<Self, EtlError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true);

        // loader runs single-threaded; one connection keeps in-memory
        // databases coherent as well
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=NORMAL;").execute(&pool).await?;

        let this = Self { pool };
        this.ensure_schema().await?;
        Ok( this )
    }

    async fn ensure_schema(&self) -> Result<(), EtlError> {
        // no primary key and no uniqueness constraint: repeated runs
        // append duplicate rows for identical catalog results
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS spotify_tracks (
              track_name   TEXT,
              artist_name  TEXT,
              popularity   INT
            );
            "#
        ).execute(&self.pool).await?;

        Ok(())
    }

    /// Insert one row per record in iteration order, committing once
    /// after all inserts. Empty input commits an empty transaction.
    pub async fn insert_tracks(&self, tracks: &[TrackRecord]) ->
        Result<u64, EtlError> {

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for track in tracks {
            let result = sqlx::query(
                r#"
                INSERT INTO spotify_tracks (track_name, artist_name, popularity)
                VALUES (?1, ?2, ?3);
                "#
            )
            .bind(&track.track_name)
            .bind(&track.artist_name)
            .bind(track.popularity)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    pub async fn count_tracks(&self) -> Result<i64, EtlError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM spotify_tracks;"
        ).fetch_one(&self.pool).await?;
        Ok(count)
    }

    #[cfg(test)]
    async fn fetch_tracks(&self) -> Result<Vec<TrackRecord>, EtlError> {
        use sqlx::Row;

        let rows = sqlx::query(
            "SELECT track_name, artist_name, popularity \
             FROM spotify_tracks ORDER BY rowid;"
        ).fetch_all(&self.pool).await?;

        Ok(rows.iter()
            .map(|row| TrackRecord {
                track_name: row.get("track_name"),
                artist_name: row.get("artist_name"),
                popularity: row.get("popularity"),
            })
            .collect())
    }
}
