//! Insert-if-absent writes for every table.
//!
//! The caller owns write order: genres, then the movie, then each person
//! before the relation that references it. A relation whose parent is
//! missing is skipped; an entity rejected for the same reason is fatal.

use rusqlite::{params, Connection};
use tracing::warn;

use crate::db::{GenreRow, MovieRow, PersonKind, PersonRow, Relation};
use crate::error::LoadError;

/// What a single write did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    Inserted,
    /// Primary key already present; the existing row is untouched.
    AlreadyPresent,
    /// Relation rejected because a referenced row does not exist.
    SkippedMissingParent,
}

pub fn upsert_genre(conn: &Connection, g: &GenreRow) -> Result<Written, LoadError> {
    let result = conn
        .prepare_cached("INSERT OR IGNORE INTO Genre (id, name) VALUES (?1, ?2)")
        .and_then(|mut stmt| stmt.execute(params![g.id, g.name]));
    entity_outcome("Genre", g.id, result)
}

pub fn upsert_movie(conn: &Connection, m: &MovieRow) -> Result<Written, LoadError> {
    let result = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO Movie
             (id, title, release_date, popularity, vote_average, vote_count, overview, original_language)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .and_then(|mut stmt| {
            stmt.execute(params![
                m.id,
                m.title,
                m.release_date,
                m.popularity,
                m.vote_average,
                m.vote_count,
                m.overview,
                m.original_language,
            ])
        });
    entity_outcome("Movie", m.id, result)
}

pub fn upsert_person(
    conn: &Connection,
    kind: PersonKind,
    p: &PersonRow,
) -> Result<Written, LoadError> {
    let result = match kind {
        PersonKind::Actor => conn
            .prepare_cached("INSERT OR IGNORE INTO Actor (id, name, gender) VALUES (?1, ?2, ?3)")
            .and_then(|mut stmt| stmt.execute(params![p.id, p.name, p.gender])),
        PersonKind::Producer => conn
            .prepare_cached("INSERT OR IGNORE INTO Producer (id, name) VALUES (?1, ?2)")
            .and_then(|mut stmt| stmt.execute(params![p.id, p.name])),
    };
    entity_outcome(kind.table(), p.id, result)
}

pub fn upsert_relation(conn: &Connection, rel: &Relation) -> Result<Written, LoadError> {
    let result = match rel {
        Relation::MovieGenre { movie_id, genre_id } => conn
            .prepare_cached("INSERT OR IGNORE INTO Movie_Genre (movie_id, genre_id) VALUES (?1, ?2)")
            .and_then(|mut stmt| stmt.execute(params![movie_id, genre_id])),
        Relation::MovieActor(r) => conn
            .prepare_cached(
                "INSERT OR IGNORE INTO Movie_Actor (movie_id, actor_id, character_name, cast_order)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![r.movie_id, r.actor_id, r.character_name, r.cast_order])
            }),
        Relation::MovieProducer {
            movie_id,
            producer_id,
        } => conn
            .prepare_cached(
                "INSERT OR IGNORE INTO Movie_Producer (movie_id, producer_id) VALUES (?1, ?2)",
            )
            .and_then(|mut stmt| stmt.execute(params![movie_id, producer_id])),
    };

    match result {
        Ok(n) => Ok(changed(n)),
        Err(e) if is_missing_parent(&e) => {
            let (movie_id, parent_id) = rel.key();
            warn!(
                "Skipping {} ({}, {}): referenced row missing",
                rel.table(),
                movie_id,
                parent_id
            );
            Ok(Written::SkippedMissingParent)
        }
        Err(source) => Err(LoadError::Store {
            table: rel.table(),
            source,
        }),
    }
}

fn entity_outcome(
    table: &'static str,
    id: i64,
    result: rusqlite::Result<usize>,
) -> Result<Written, LoadError> {
    match result {
        Ok(n) => Ok(changed(n)),
        Err(e) if is_missing_parent(&e) => Err(LoadError::EntityOrdering { table, id }),
        Err(source) => Err(LoadError::Store { table, source }),
    }
}

fn changed(rows: usize) -> Written {
    if rows == 0 {
        Written::AlreadyPresent
    } else {
        Written::Inserted
    }
}

fn is_missing_parent(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_schema, table_counts, MovieActorRow, Store};

    fn store() -> Store {
        let store = Store::open_in_memory().unwrap();
        init_schema(store.conn()).unwrap();
        store
    }

    fn movie(id: i64, title: &str) -> MovieRow {
        MovieRow {
            id,
            title: title.into(),
            release_date: Some("1999-10-15".into()),
            popularity: 60.1,
            vote_average: 8.4,
            vote_count: 27000,
            overview: String::new(),
            original_language: "en".into(),
        }
    }

    fn person(id: i64) -> PersonRow {
        PersonRow {
            id,
            name: format!("Person {}", id),
            gender: Some(1),
        }
    }

    fn count(store: &Store, table: &str) -> usize {
        table_counts(store.conn())
            .unwrap()
            .into_iter()
            .find(|(t, _)| *t == table)
            .map(|(_, n)| n)
            .unwrap()
    }

    #[test]
    fn first_write_wins() {
        let s = store();
        let c = s.conn();
        assert_eq!(upsert_movie(c, &movie(550, "Fight Club")).unwrap(), Written::Inserted);
        assert_eq!(
            upsert_movie(c, &movie(550, "Renamed")).unwrap(),
            Written::AlreadyPresent
        );
        let title: String = c
            .query_row("SELECT title FROM Movie WHERE id = 550", [], |r| r.get(0))
            .unwrap();
        assert_eq!(title, "Fight Club");
    }

    #[test]
    fn same_person_in_both_roles() {
        let s = store();
        let c = s.conn();
        assert_eq!(upsert_person(c, PersonKind::Actor, &person(7)).unwrap(), Written::Inserted);
        assert_eq!(
            upsert_person(c, PersonKind::Producer, &person(7)).unwrap(),
            Written::Inserted
        );
        let gender: Option<i32> = c
            .query_row("SELECT gender FROM Actor WHERE id = 7", [], |r| r.get(0))
            .unwrap();
        assert_eq!(gender, Some(1));
    }

    #[test]
    fn relation_with_missing_genre_is_skipped() {
        let s = store();
        let c = s.conn();
        upsert_genre(c, &GenreRow { id: 18, name: "Drama".into() }).unwrap();
        upsert_movie(c, &movie(1, "One")).unwrap();

        let ok = Relation::MovieGenre { movie_id: 1, genre_id: 18 };
        let orphan = Relation::MovieGenre { movie_id: 1, genre_id: 10770 };
        assert_eq!(upsert_relation(c, &ok).unwrap(), Written::Inserted);
        assert_eq!(
            upsert_relation(c, &orphan).unwrap(),
            Written::SkippedMissingParent
        );
        assert_eq!(count(&s, "Movie_Genre"), 1);
    }

    #[test]
    fn relation_before_movie_is_skipped() {
        let s = store();
        let c = s.conn();
        upsert_person(c, PersonKind::Producer, &person(3)).unwrap();
        let rel = Relation::MovieProducer { movie_id: 42, producer_id: 3 };
        assert_eq!(upsert_relation(c, &rel).unwrap(), Written::SkippedMissingParent);
    }

    #[test]
    fn second_role_for_same_actor_is_dropped() {
        let s = store();
        let c = s.conn();
        upsert_movie(c, &movie(1, "The Parent Trap")).unwrap();
        upsert_person(c, PersonKind::Actor, &person(5)).unwrap();
        let role = |name: &str, order| {
            Relation::MovieActor(MovieActorRow {
                movie_id: 1,
                actor_id: 5,
                character_name: name.into(),
                cast_order: order,
            })
        };
        assert_eq!(upsert_relation(c, &role("Hallie", 0)).unwrap(), Written::Inserted);
        assert_eq!(
            upsert_relation(c, &role("Annie", 1)).unwrap(),
            Written::AlreadyPresent
        );
        let character: String = c
            .query_row("SELECT character_name FROM Movie_Actor", [], |r| r.get(0))
            .unwrap();
        assert_eq!(character, "Hallie");
    }

    #[test]
    fn entity_with_missing_parent_is_fatal() {
        let s = store();
        let c = s.conn();
        // A stricter external schema: producers belong to a studio.
        c.execute_batch(
            "DROP TABLE Movie_Producer;
             DROP TABLE Producer;
             CREATE TABLE Studio (id INTEGER PRIMARY KEY);
             CREATE TABLE Producer (
                 id INTEGER PRIMARY KEY,
                 name TEXT NOT NULL,
                 studio_id INTEGER NOT NULL DEFAULT 1 REFERENCES Studio(id)
             );",
        )
        .unwrap();
        let err = upsert_person(c, PersonKind::Producer, &person(9)).unwrap_err();
        assert!(matches!(
            err,
            LoadError::EntityOrdering { table: "Producer", id: 9 }
        ));
    }

    #[test]
    fn other_store_errors_are_not_skipped() {
        let s = store();
        let c = s.conn();
        c.execute_batch("DROP TABLE Movie_Genre;").unwrap();
        let rel = Relation::MovieGenre { movie_id: 1, genre_id: 1 };
        let err = upsert_relation(c, &rel).unwrap_err();
        assert!(matches!(err, LoadError::Store { table: "Movie_Genre", .. }));
    }
}
