//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `creations`, `images`, and `text_outputs`.
//! Rows reference each other by id only; ownership is maintained by the
//! history facade rather than by foreign keys.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Creations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS creations (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    name              TEXT NOT NULL,
    type              TEXT NOT NULL,              -- generated | analyzed | reimagined
    created_at        INTEGER NOT NULL,           -- unix millis
    updated_at        INTEGER NOT NULL,           -- unix millis
    params            TEXT NOT NULL,              -- JSON object, shape keyed by type
    image_id          TEXT,                       -- -> images(id)
    original_image_id TEXT,                       -- -> images(id), reimagined only
    output_id         TEXT                        -- -> text_outputs(id)
);

CREATE INDEX IF NOT EXISTS idx_creations_created_at ON creations(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_creations_type ON creations(type);

-- ----------------------------------------------------------------
-- Images
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS images (
    id             TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    image_data_uri TEXT NOT NULL                  -- data:<mime>;base64,<payload>
);

-- ----------------------------------------------------------------
-- Text outputs
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS text_outputs (
    id   TEXT PRIMARY KEY NOT NULL,               -- UUID v4
    data TEXT NOT NULL                            -- JSON object, shape keyed by flow
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
