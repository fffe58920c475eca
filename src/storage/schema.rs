//! Database schema definitions
//!
//! One table per hierarchy level, each unique on (year, code). A completion
//! column is NULL until the row's children have been committed.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvester runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    year INTEGER NOT NULL,
    depth TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    failed_nodes INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS provinces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    year INTEGER NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    url TEXT,
    cities_expanded INTEGER,
    created_at TEXT NOT NULL,
    expanded_at TEXT,
    UNIQUE(year, code)
);

CREATE TABLE IF NOT EXISTS cities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    year INTEGER NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    url TEXT,
    province_code TEXT NOT NULL,
    districts_expanded INTEGER,
    created_at TEXT NOT NULL,
    expanded_at TEXT,
    UNIQUE(year, code),
    FOREIGN KEY (year, province_code) REFERENCES provinces(year, code)
);

CREATE INDEX IF NOT EXISTS idx_cities_parent ON cities(year, province_code);

CREATE TABLE IF NOT EXISTS districts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    year INTEGER NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    url TEXT,
    city_code TEXT NOT NULL,
    towns_expanded INTEGER,
    created_at TEXT NOT NULL,
    expanded_at TEXT,
    UNIQUE(year, code),
    FOREIGN KEY (year, city_code) REFERENCES cities(year, code)
);

CREATE INDEX IF NOT EXISTS idx_districts_parent ON districts(year, city_code);

CREATE TABLE IF NOT EXISTS towns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    year INTEGER NOT NULL,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    url TEXT,
    district_code TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expanded_at TEXT,
    UNIQUE(year, code),
    FOREIGN KEY (year, district_code) REFERENCES districts(year, code)
);

CREATE INDEX IF NOT EXISTS idx_towns_parent ON towns(year, district_code);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
