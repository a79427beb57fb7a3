use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Existing rows read back as not translated
ALTER TABLE creations ADD COLUMN is_translated INTEGER NOT NULL DEFAULT 0;

CREATE INDEX IF NOT EXISTS idx_creations_is_translated ON creations(is_translated);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
