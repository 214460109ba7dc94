use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use tracing::debug;

use crate::error::Result;

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    external_id TEXT,
    name_tc TEXT NOT NULL,
    name_en TEXT,
    description_tc TEXT,
    start_date DATE,
    end_date DATE,
    start_at TIMESTAMP,
    end_at TIMESTAMP,
    location_address_tc TEXT,
    location_lat REAL,
    location_lng REAL,
    quota INTEGER,
    organizer_tc TEXT,
    activity_nature_tc TEXT,
    sessions TEXT NOT NULL DEFAULT '[]',
    thumbnail_url TEXT,
    created_at TIMESTAMP NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS events_external_id ON events (external_id);

CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name TEXT NOT NULL,
    contact TEXT NOT NULL,
    address TEXT,
    english_name TEXT,
    region TEXT,
    school TEXT,
    remarks TEXT,
    registered_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance (
    event_id INTEGER NOT NULL REFERENCES events (id),
    student_id INTEGER NOT NULL REFERENCES students (id),
    attended BOOLEAN NOT NULL DEFAULT 0,
    updated_at TIMESTAMP NOT NULL,
    PRIMARY KEY (event_id, student_id)
);
";

/// Opens (creating if needed) the SQLite file and brings the schema up.
pub fn connect(db_path: &Path) -> Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(&format!("{}", db_path.display()))?;
    bootstrap(&mut conn)?;
    debug!(db_path = %db_path.display(), "opened store");
    Ok(conn)
}

pub fn connect_in_memory() -> Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(":memory:")?;
    bootstrap(&mut conn)?;
    Ok(conn)
}

fn bootstrap(conn: &mut SqliteConnection) -> Result<()> {
    conn.batch_execute(SCHEMA)?;
    Ok(())
}

pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("center.db");
        drop(connect(&path).unwrap());
        let mut conn = connect(&path).unwrap();
        bootstrap(&mut conn).unwrap();
    }
}
