//!
//! src/main.rs
//!
//! Main source file wiring the extract, transform and load stages into
//! one sequential run, plus live testbenches for the spotify client
//!
//!

mod config;
mod errors;
mod logging;

mod fetch;
mod handoff;
mod persistent;
mod stages;
mod types;

use crate::errors::EtlError;
use crate::handoff::MemoryHandoff;

#[tokio::main]
async fn main() -> Result<(), EtlError> {
    let cfgs   = config::load_config()?;
    let _guard = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service = "track-etl",
        version = %env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let spotify = fetch::SpotifyClient::new(&cfgs.http, &cfgs.spotify)?;
    let db      = persistent::Persistent::init(&cfgs.persistence.db_url).await?;
    let handoff = MemoryHandoff::new();

    let rows  = stages::run_pipeline(&spotify, &cfgs.etl, &db, &handoff).await?;
    let total = db.count_tracks().await?;

    tracing::info!(rows, total, "etl.complete");
    Ok(())
}
