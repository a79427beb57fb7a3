//! One-time data migrations.
//!
//! Unlike schema migrations these rewrite row contents. Each entry is
//! idempotent and recorded by name in `applied_data_migrations` once it
//! succeeds. They run after the schema is current, each in its own
//! transaction; a failure is logged and the migration is retried on the next
//! open. Nothing here may prevent the store from opening.

use std::collections::HashSet;

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::now_millis;

pub struct DataMigration {
    pub name: &'static str,
    pub run: fn(&Connection) -> Result<usize>,
}

/// Registered migrations, in execution order.
pub const REGISTRY: &[DataMigration] = &[DataMigration {
    name: "repair-mojibake-text",
    run: repair_mojibake_text,
}];

/// Run every registered migration that has not been applied yet.
///
/// Returns the names of the migrations applied by this call.
pub fn run_pending(conn: &mut Connection) -> Vec<&'static str> {
    run_registry(conn, REGISTRY)
}

pub(crate) fn run_registry(
    conn: &mut Connection,
    registry: &[DataMigration],
) -> Vec<&'static str> {
    let applied = match applied_names(conn) {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, "could not read applied data migrations, skipping");
            return Vec::new();
        }
    };

    let mut ran = Vec::new();
    for migration in registry.iter().filter(|m| !applied.contains(m.name)) {
        match apply(conn, migration) {
            Ok(rows) => {
                tracing::info!(migration = migration.name, rows, "data migration applied");
                ran.push(migration.name);
            }
            Err(e) => {
                tracing::warn!(migration = migration.name, error = %e, "data migration failed");
            }
        }
    }
    ran
}

fn applied_names(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM applied_data_migrations")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut names = HashSet::new();
    for row in rows {
        names.insert(row?);
    }
    Ok(names)
}

fn apply(conn: &mut Connection, migration: &DataMigration) -> Result<usize> {
    let tx = conn.transaction()?;
    let rows = (migration.run)(&tx)?;
    tx.execute(
        "INSERT INTO applied_data_migrations (name, applied_at) VALUES (?1, ?2)",
        params![migration.name, now_millis()],
    )?;
    tx.commit()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// repair-mojibake-text
// ---------------------------------------------------------------------------

/// Re-decode creation names, params and text outputs that were stored as
/// UTF-8 bytes read back as Latin-1 (`MitologÃ­a` instead of `Mitología`).
fn repair_mojibake_text(conn: &Connection) -> Result<usize> {
    let mut repaired = 0;

    let creations: Vec<(String, String, String)> = {
        let mut stmt = conn.prepare("SELECT id, name, params FROM creations")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    for (id, name, params_json) in creations {
        let fixed_name = repair_mojibake(&name);
        let fixed_params = repair_mojibake(&params_json);
        if fixed_name.is_none() && fixed_params.is_none() {
            continue;
        }
        conn.execute(
            "UPDATE creations SET name = ?2, params = ?3 WHERE id = ?1",
            params![
                id,
                fixed_name.unwrap_or(name),
                fixed_params.unwrap_or(params_json)
            ],
        )?;
        repaired += 1;
    }

    let outputs: Vec<(String, String)> = {
        let mut stmt = conn.prepare("SELECT id, data FROM text_outputs")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    for (id, data) in outputs {
        if let Some(fixed) = repair_mojibake(&data) {
            conn.execute(
                "UPDATE text_outputs SET data = ?2 WHERE id = ?1",
                params![id, fixed],
            )?;
            repaired += 1;
        }
    }

    Ok(repaired)
}

/// Returns the repaired string, or `None` when `text` does not look
/// double-encoded or cannot be reinterpreted as UTF-8.
pub(crate) fn repair_mojibake(text: &str) -> Option<String> {
    if !text.contains(&['Ã', 'Â'][..]) {
        return None;
    }
    let bytes = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()?;
    let fixed = String::from_utf8(bytes).ok()?;
    (fixed != text).then_some(fixed)
}
