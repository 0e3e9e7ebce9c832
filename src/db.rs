use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// The single store handle for a run. Loader and commit controller borrow it.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {:?}", dir))?;
        }
        let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Store { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Store { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Drops the connection. Any open transaction is rolled back by SQLite.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}

/// Provision the seven tables for a local database. Production schemas are
/// managed outside this tool; this only mirrors their contract.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS Genre (
            id    INTEGER PRIMARY KEY,
            name  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS Movie (
            id                INTEGER PRIMARY KEY,
            title             TEXT NOT NULL,
            release_date      TEXT,
            popularity        REAL,
            vote_average      REAL,
            vote_count        INTEGER,
            overview          TEXT,
            original_language TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_movie_release ON Movie(release_date);
        CREATE INDEX IF NOT EXISTS idx_movie_vote ON Movie(vote_average);

        CREATE TABLE IF NOT EXISTS Actor (
            id      INTEGER PRIMARY KEY,
            name    TEXT NOT NULL,
            gender  INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_actor_name ON Actor(name);

        CREATE TABLE IF NOT EXISTS Producer (
            id    INTEGER PRIMARY KEY,
            name  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_producer_name ON Producer(name);

        CREATE TABLE IF NOT EXISTS Movie_Genre (
            movie_id  INTEGER NOT NULL REFERENCES Movie(id) ON DELETE CASCADE,
            genre_id  INTEGER NOT NULL REFERENCES Genre(id) ON DELETE CASCADE,
            PRIMARY KEY (movie_id, genre_id)
        );

        CREATE TABLE IF NOT EXISTS Movie_Actor (
            movie_id        INTEGER NOT NULL REFERENCES Movie(id) ON DELETE CASCADE,
            actor_id        INTEGER NOT NULL REFERENCES Actor(id) ON DELETE CASCADE,
            character_name  TEXT,
            cast_order      INTEGER,
            PRIMARY KEY (movie_id, actor_id)
        );

        CREATE TABLE IF NOT EXISTS Movie_Producer (
            movie_id     INTEGER NOT NULL REFERENCES Movie(id) ON DELETE CASCADE,
            producer_id  INTEGER NOT NULL REFERENCES Producer(id) ON DELETE CASCADE,
            PRIMARY KEY (movie_id, producer_id)
        );
        ",
    )?;
    Ok(())
}

// ── Rows ──

#[derive(Debug, Clone, PartialEq)]
pub struct GenreRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieRow {
    pub id: i64,
    pub title: String,
    pub release_date: Option<String>,
    pub popularity: f64,
    pub vote_average: f64,
    pub vote_count: i64,
    pub overview: String,
    pub original_language: String,
}

/// Actor or producer. `gender` is only stored for actors.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonRow {
    pub id: i64,
    pub name: String,
    pub gender: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieActorRow {
    pub movie_id: i64,
    pub actor_id: i64,
    pub character_name: String,
    pub cast_order: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonKind {
    Actor,
    Producer,
}

impl PersonKind {
    pub fn table(self) -> &'static str {
        match self {
            PersonKind::Actor => "Actor",
            PersonKind::Producer => "Producer",
        }
    }
}

/// A join-table tuple. Every variant references a movie plus one other parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    MovieGenre { movie_id: i64, genre_id: i64 },
    MovieActor(MovieActorRow),
    MovieProducer { movie_id: i64, producer_id: i64 },
}

impl Relation {
    pub fn table(&self) -> &'static str {
        match self {
            Relation::MovieGenre { .. } => "Movie_Genre",
            Relation::MovieActor(_) => "Movie_Actor",
            Relation::MovieProducer { .. } => "Movie_Producer",
        }
    }

    /// (movie_id, other parent id)
    pub fn key(&self) -> (i64, i64) {
        match self {
            Relation::MovieGenre { movie_id, genre_id } => (*movie_id, *genre_id),
            Relation::MovieActor(r) => (r.movie_id, r.actor_id),
            Relation::MovieProducer {
                movie_id,
                producer_id,
            } => (*movie_id, *producer_id),
        }
    }
}

// ── Stats ──

pub const TABLES: [&str; 7] = [
    "Genre",
    "Movie",
    "Actor",
    "Producer",
    "Movie_Genre",
    "Movie_Actor",
    "Movie_Producer",
];

pub fn table_counts(conn: &Connection) -> Result<Vec<(&'static str, usize)>> {
    TABLES
        .iter()
        .map(|table| -> Result<(&'static str, usize)> {
            let n: usize =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
            Ok((*table, n))
        })
        .collect()
}
