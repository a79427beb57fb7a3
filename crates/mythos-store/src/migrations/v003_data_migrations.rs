use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Names of one-time data migrations that already ran
CREATE TABLE IF NOT EXISTS applied_data_migrations (
    name       TEXT PRIMARY KEY NOT NULL,
    applied_at INTEGER NOT NULL               -- unix millis
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
