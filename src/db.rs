use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::config::Config;
use crate::error::Result;
use crate::filters::FilterConfiguration;
use crate::sources::KeyValueStore;

/// Safely convert a Unix timestamp to DateTime<Utc>, falling back to current time if invalid
fn timestamp_to_datetime(timestamp: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

const CONFIG_COLUMNS: &str = "remote_id, name, filters, notify, watched, position, updated_at";

fn config_from_row(row: &Row<'_>) -> rusqlite::Result<FilterConfiguration> {
    let filters: String = row.get(2)?;
    Ok(FilterConfiguration {
        id: row.get(0)?,
        name: row.get(1)?,
        filters: serde_json::from_str(&filters).unwrap_or_default(),
        notify: row.get(3)?,
        watched: row.get(4)?,
        position: row.get(5)?,
        updated_at: timestamp_to_datetime(row.get(6)?),
    })
}

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database
    pub fn open() -> Result<Self> {
        let db_path = Config::db_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::prepare(Connection::open(&db_path)?)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(mut conn: Connection) -> Result<Self> {
        embedded::migrations::runner().run(&mut conn)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    // ========== Key/value operations ==========

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self.conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        ).optional()?;
        Ok(value)
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub fn delete_value(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ========== Filter configuration operations ==========

    /// Insert or replace a configuration, keyed by name
    pub fn upsert_config(&self, config: &FilterConfiguration) -> Result<()> {
        self.conn.execute(
            "INSERT INTO filter_configs (remote_id, name, filters, notify, watched, position, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO UPDATE SET
                remote_id = excluded.remote_id,
                filters = excluded.filters,
                notify = excluded.notify,
                watched = excluded.watched,
                position = excluded.position,
                updated_at = excluded.updated_at",
            params![
                config.id,
                config.name,
                serde_json::to_string(&config.filters)?,
                config.notify,
                config.watched,
                config.position,
                config.updated_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    /// Get a configuration by name
    pub fn get_config(&self, name: &str) -> Result<Option<FilterConfiguration>> {
        let config = self.conn.query_row(
            &format!("SELECT {} FROM filter_configs WHERE name = ?1", CONFIG_COLUMNS),
            params![name],
            config_from_row,
        ).optional()?;
        Ok(config)
    }

    /// List all configurations in display order
    pub fn list_configs(&self) -> Result<Vec<FilterConfiguration>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM filter_configs ORDER BY position ASC, name ASC",
            CONFIG_COLUMNS
        ))?;
        let configs = stmt
            .query_map([], config_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(configs)
    }

    /// Delete a configuration, returning whether it existed
    pub fn delete_config(&self, name: &str) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM filter_configs WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }

    /// Position for a newly appended configuration
    pub fn next_position(&self) -> Result<i64> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(position) FROM filter_configs",
            [],
            |row| row.get(0),
        )?;
        Ok(max.map(|p| p + 1).unwrap_or(0))
    }

    /// Rewrite positions so `names` come first, in the given order
    pub fn set_positions(&mut self, names: &[String]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE filter_configs SET position = ?1 WHERE name = ?2")?;
            for (position, name) in names.iter().enumerate() {
                stmt.execute(params![position as i64, name])?;
            }
            // Anything not named keeps its relative order after the named ones
            tx.execute(
                "UPDATE filter_configs SET position = position + ?1 WHERE name NOT IN (SELECT value FROM json_each(?2))",
                params![names.len() as i64, serde_json::to_string(names)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Replace every server-backed row with `configs`; local-only rows are kept
    pub fn replace_remote_configs(&mut self, configs: &[FilterConfiguration]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM filter_configs WHERE remote_id IS NOT NULL", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO filter_configs (remote_id, name, filters, notify, watched, position, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(name) DO UPDATE SET
                    remote_id = excluded.remote_id,
                    filters = excluded.filters,
                    notify = excluded.notify,
                    watched = excluded.watched,
                    position = excluded.position,
                    updated_at = excluded.updated_at",
            )?;
            for config in configs {
                stmt.execute(params![
                    config.id,
                    config.name,
                    serde_json::to_string(&config.filters)?,
                    config.notify,
                    config.watched,
                    config.position,
                    config.updated_at.timestamp(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Shareable handle that runs database work off the async runtime
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
}

impl LocalStore {
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(Mutex::new(db)) }
    }

    /// Run `f` against the database on the blocking pool
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut db = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut db)
        })
        .await?
    }
}

#[async_trait]
impl KeyValueStore for LocalStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.run(move |db| db.get_value(&key)).await
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.run(move |db| db.set_value(&key, &value)).await
    }
}
