//! v001 -- One key/value table per storage tier.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sync_items (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL               -- JSON-encoded
);

CREATE TABLE IF NOT EXISTS local_items (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL               -- JSON-encoded
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
