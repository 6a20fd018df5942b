//! Session-scoped relational store over SQLite.
//!
//! Every table carries a `session_id` foreign key with `ON DELETE CASCADE`;
//! entity, item, location, and storage keys are unique per session. The
//! store exposes typed CRUD only; business invariants live in the managers.
//!
//! Table functions take `&mut SqliteConnection` so the same code runs
//! against a pooled connection or inside a transaction.

pub mod entities;
pub mod error;
pub mod facts;
pub mod game_time;
pub mod items;
pub mod locations;
pub mod needs;
pub mod quests;
pub mod relationships;
pub mod schedules;
pub mod sessions;
pub mod storages;
pub mod turns;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;

pub use error::StoreError;

/// Handle to the session database.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database at `database_url` and bootstrap the
    /// schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.bootstrap_schema().await?;
        Ok(store)
    }

    /// In-memory database for tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        // A single connection keeps the in-memory database alive and shared.
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Database(e.to_string()))?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.bootstrap_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction for atomic delta application.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    async fn bootstrap_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// Schema statements, applied idempotently on connect.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        setting TEXT NOT NULL,
        player_entity TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        total_turns INTEGER NOT NULL DEFAULT 0,
        state_version INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entities (
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        display_name TEXT NOT NULL,
        kind TEXT NOT NULL,
        is_alive INTEGER NOT NULL DEFAULT 1,
        is_active INTEGER NOT NULL DEFAULT 1,
        might INTEGER NOT NULL DEFAULT 50,
        agility INTEGER NOT NULL DEFAULT 50,
        endurance INTEGER NOT NULL DEFAULT 50,
        wits INTEGER NOT NULL DEFAULT 50,
        presence INTEGER NOT NULL DEFAULT 50,
        resolve INTEGER NOT NULL DEFAULT 50,
        skills TEXT NOT NULL DEFAULT '{}',
        appearance_height TEXT,
        appearance_build TEXT,
        appearance_hair TEXT,
        appearance_eyes TEXT,
        appearance_notes TEXT,
        appearance_extra TEXT,
        background TEXT NOT NULL DEFAULT '',
        personality TEXT NOT NULL DEFAULT '',
        hit_points INTEGER NOT NULL DEFAULT 20,
        max_hit_points INTEGER NOT NULL DEFAULT 20,
        location_key TEXT,
        PRIMARY KEY (session_id, key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        display_name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        parent_key TEXT,
        category TEXT NOT NULL,
        spatial_exits TEXT NOT NULL DEFAULT '{}',
        PRIMARY KEY (session_id, key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS storage_locations (
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        display_name TEXT NOT NULL,
        kind TEXT NOT NULL,
        owner_entity TEXT,
        container_item TEXT,
        location_key TEXT,
        capacity REAL,
        PRIMARY KEY (session_id, key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        display_name TEXT NOT NULL,
        kind TEXT NOT NULL,
        owner_entity TEXT,
        holder_entity TEXT,
        storage_location TEXT,
        owner_location TEXT,
        body_slot TEXT,
        body_layer INTEGER,
        weight REAL NOT NULL DEFAULT 1.0,
        condition TEXT NOT NULL DEFAULT 'good',
        properties TEXT,
        PRIMARY KEY (session_id, key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS relationships (
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        from_entity TEXT NOT NULL,
        to_entity TEXT NOT NULL,
        trust INTEGER NOT NULL,
        liking INTEGER NOT NULL,
        respect INTEGER NOT NULL,
        fear INTEGER NOT NULL,
        familiarity INTEGER NOT NULL,
        romantic_interest INTEGER NOT NULL,
        has_met INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (session_id, from_entity, to_entity)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS relationship_changes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        from_entity TEXT NOT NULL,
        to_entity TEXT NOT NULL,
        dimension TEXT NOT NULL,
        delta INTEGER NOT NULL,
        reason TEXT NOT NULL DEFAULT '',
        turn_number INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS facts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        subject_type TEXT NOT NULL,
        subject_key TEXT NOT NULL,
        predicate TEXT NOT NULL,
        value TEXT NOT NULL,
        is_secret INTEGER NOT NULL DEFAULT 0,
        certainty REAL NOT NULL DEFAULT 1.0,
        recorded_turn INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS character_needs (
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        entity_key TEXT NOT NULL,
        levels TEXT NOT NULL,
        last_communicated TEXT NOT NULL DEFAULT '{}',
        cravings TEXT NOT NULL DEFAULT '{}',
        PRIMARY KEY (session_id, entity_key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS time_state (
        session_id TEXT PRIMARY KEY REFERENCES sessions(id) ON DELETE CASCADE,
        current_day INTEGER NOT NULL,
        minutes_of_day INTEGER NOT NULL,
        weather TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS turns (
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        turn_number INTEGER NOT NULL,
        player_input TEXT NOT NULL,
        gm_response TEXT NOT NULL,
        mentioned_items TEXT NOT NULL DEFAULT '[]',
        is_ooc INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        PRIMARY KEY (session_id, turn_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS quests (
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'active',
        target_entity TEXT,
        destination TEXT,
        quest_item TEXT,
        PRIMARY KEY (session_id, key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS appointments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        entity_key TEXT NOT NULL,
        day INTEGER NOT NULL,
        time_minutes INTEGER NOT NULL,
        location_key TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schedules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        entity_key TEXT NOT NULL,
        day_of_week TEXT NOT NULL,
        time_minutes INTEGER NOT NULL,
        location_key TEXT NOT NULL,
        activity TEXT NOT NULL DEFAULT ''
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_items_holder ON items(session_id, holder_entity)",
    "CREATE INDEX IF NOT EXISTS idx_items_location ON items(session_id, owner_location)",
    "CREATE INDEX IF NOT EXISTS idx_entities_location ON entities(session_id, location_key)",
    "CREATE INDEX IF NOT EXISTS idx_facts_subject ON facts(session_id, subject_type, subject_key)",
    "CREATE INDEX IF NOT EXISTS idx_facts_predicate ON facts(session_id, predicate)",
    "CREATE INDEX IF NOT EXISTS idx_schedules_entity ON schedules(session_id, entity_key)",
];
