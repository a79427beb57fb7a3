//! Database migration runner.
//!
//! Migrations are executed in order on every [`Database::open_at`] call.
//! Each migration is guarded by the `user_version` pragma so it runs exactly
//! once, and runs inside its own transaction together with the version bump
//! so a failed upgrade leaves the previous schema and its rows intact.
//!
//! [`Database::open_at`]: crate::Database::open_at

pub mod v001_initial;
pub mod v002_translated_flag;
pub mod v003_data_migrations;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

type Step = fn(&Connection) -> std::result::Result<(), rusqlite::Error>;

/// Ordered schema steps. Append only; the position is the version number.
const STEPS: &[(&str, Step)] = &[
    ("v001_initial", v001_initial::up),
    ("v002_translated_flag", v002_translated_flag::up),
    ("v003_data_migrations", v003_data_migrations::up),
];

/// Current schema version.
pub const CURRENT_VERSION: u32 = STEPS.len() as u32;

/// Run all pending migrations against the open connection.
///
/// The function reads `PRAGMA user_version` to determine which migrations have
/// already been applied, then executes any outstanding ones in order.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::info!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking database migrations"
    );

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{current} is newer than supported v{CURRENT_VERSION}"
        )));
    }

    for (index, (name, up)) in STEPS.iter().enumerate().skip(current as usize) {
        let version = index as u32 + 1;
        tracing::info!(version, "applying migration {name}");

        let tx = conn.transaction()?;
        up(&tx).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }

    Ok(())
}
