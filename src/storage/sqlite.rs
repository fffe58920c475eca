//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RegionStore trait.

use crate::region::{Expansion, Level, NewRegion, RegionNode};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RegionStore, StorageError, StorageResult};
use crate::storage::{LevelStats, RunRecord, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteRegionStore {
    conn: Connection,
}

impl SqliteRegionStore {
    /// Opens or creates the database at `path`
    ///
    /// Missing parent directories are created.
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Column list shared by every region query
///
/// Provinces select a NULL parent and towns a NULL completion so that all
/// levels map through `region_from_row`.
fn region_columns(level: Level) -> String {
    format!(
        "id, year, code, name, url, {}, {}, created_at, expanded_at",
        level.parent_column().unwrap_or("NULL"),
        level.completion_column().unwrap_or("NULL"),
    )
}

fn region_from_row(level: Level, row: &Row<'_>) -> rusqlite::Result<RegionNode> {
    Ok(RegionNode {
        id: row.get(0)?,
        level,
        year: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        url: row.get(4)?,
        parent_code: row.get(5)?,
        expansion: Expansion::from_column(row.get(6)?),
        created_at: row.get(7)?,
        expanded_at: row.get(8)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        year: row.get(3)?,
        depth: Level::from_db_string(&row.get::<_, String>(4)?).unwrap_or(Level::District),
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Running),
        failed_nodes: row.get(7)?,
    })
}

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, year, depth, config_hash, status, failed_nodes";

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl RegionStore for SqliteRegionStore {
    // ===== Region Queries =====

    fn find_missing_completion(&self, year: u16, level: Level) -> StorageResult<Vec<RegionNode>> {
        let Some(completion) = level.completion_column() else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {} FROM {} WHERE year = ?1 AND {} IS NULL
             AND url IS NOT NULL AND url <> '' ORDER BY code",
            region_columns(level),
            level.table(),
            completion
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let nodes = stmt
            .query_map(params![year], |row| region_from_row(level, row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(nodes)
    }

    fn exists(&self, level: Level, year: u16, code: &str) -> StorageResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE year = ?1 AND code = ?2)",
            level.table()
        );
        let found: bool = self
            .conn
            .query_row(&sql, params![year, code], |row| row.get(0))?;
        Ok(found)
    }

    fn get_region(&self, level: Level, year: u16, code: &str) -> StorageResult<Option<RegionNode>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE year = ?1 AND code = ?2",
            region_columns(level),
            level.table()
        );

        let node = self
            .conn
            .query_row(&sql, params![year, code], |row| region_from_row(level, row))
            .optional()?;

        Ok(node)
    }

    fn list_regions(&self, level: Level, year: u16) -> StorageResult<Vec<RegionNode>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE year = ?1 ORDER BY code",
            region_columns(level),
            level.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let nodes = stmt
            .query_map(params![year], |row| region_from_row(level, row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(nodes)
    }

    // ===== Region Writes =====

    fn insert(&mut self, level: Level, region: &NewRegion<'_>) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();

        let result = match level.parent_column() {
            None => self.conn.execute(
                "INSERT INTO provinces (year, code, name, url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![region.year, region.code, region.name, region.url, now],
            ),
            Some(parent_column) => {
                let parent_code = region.parent_code.ok_or_else(|| StorageError::MissingParent {
                    level,
                    code: region.code.to_string(),
                })?;
                let sql = format!(
                    "INSERT INTO {} (year, code, name, url, {}, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    level.table(),
                    parent_column
                );
                self.conn.execute(
                    &sql,
                    params![region.year, region.code, region.name, region.url, parent_code, now],
                )
            }
        };

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StorageError::Conflict {
                level,
                year: region.year,
                code: region.code.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn update_completion(
        &mut self,
        level: Level,
        year: u16,
        code: &str,
        count: u32,
    ) -> StorageResult<bool> {
        let completion = level
            .completion_column()
            .ok_or(StorageError::NoCompletion(level))?;

        let now = Utc::now().to_rfc3339();
        let sql = format!(
            "UPDATE {} SET {col} = ?1, expanded_at = ?2
             WHERE year = ?3 AND code = ?4 AND {col} IS NULL",
            level.table(),
            col = completion
        );
        let changed = self.conn.execute(&sql, params![count, now, year, code])?;

        Ok(changed > 0)
    }

    // ===== Run Management =====

    fn create_run(&mut self, year: u16, depth: Level, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, year, depth, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                now,
                year,
                depth.to_db_string(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        failed_nodes: u32,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, failed_nodes = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, failed_nodes, run_id],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    // ===== Statistics =====

    fn level_stats(&self, level: Level, year: u16) -> StorageResult<LevelStats> {
        let (expanded, found, pending) = match level.completion_column() {
            Some(c) => (
                format!("COUNT({})", c),
                format!("COALESCE(SUM({}), 0)", c),
                format!(
                    "COALESCE(SUM(CASE WHEN {} IS NULL AND url IS NOT NULL AND url <> '' THEN 1 ELSE 0 END), 0)",
                    c
                ),
            ),
            None => ("0".to_string(), "0".to_string(), "0".to_string()),
        };

        let sql = format!(
            "SELECT COUNT(*), {}, {}, {},
             COALESCE(SUM(CASE WHEN url IS NULL OR url = '' THEN 1 ELSE 0 END), 0)
             FROM {} WHERE year = ?1",
            expanded,
            pending,
            found,
            level.table()
        );

        let stats = self.conn.query_row(&sql, params![year], |row| {
            Ok(LevelStats {
                total: row.get::<_, i64>(0)? as u64,
                expanded: row.get::<_, i64>(1)? as u64,
                pending: row.get::<_, i64>(2)? as u64,
                children_found: row.get::<_, i64>(3)? as u64,
                leaves: row.get::<_, i64>(4)? as u64,
            })
        })?;

        Ok(stats)
    }
}
