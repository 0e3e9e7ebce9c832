use chrono::NaiveDate;

use crate::catalog::models::{Credits, RawMovie};
use crate::db::{MovieActorRow, MovieRow, PersonRow, Relation};

const PRODUCER_JOB: &str = "Producer";

/// Everything one discovery record (plus its credits) contributes to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMovie {
    pub movie: MovieRow,
    pub genres: Vec<Relation>,
    pub cast: Vec<(PersonRow, Relation)>,
    pub producers: Vec<(PersonRow, Relation)>,
}

impl NormalizedMovie {
    pub fn relation_count(&self) -> usize {
        self.genres.len() + self.cast.len() + self.producers.len()
    }
}

/// Map a feed record and its optional credits into rows. No I/O.
pub fn normalize(raw: &RawMovie, credits: Option<&Credits>, cast_limit: usize) -> NormalizedMovie {
    let movie = MovieRow {
        id: raw.id,
        title: raw.title.clone().unwrap_or_default(),
        release_date: raw.release_date.as_deref().and_then(parse_release_date),
        popularity: raw.popularity.unwrap_or(0.0),
        vote_average: raw.vote_average.unwrap_or(0.0),
        vote_count: raw.vote_count.unwrap_or(0),
        overview: raw.overview.clone().unwrap_or_default(),
        original_language: raw.original_language.clone().unwrap_or_default(),
    };

    let genres = raw
        .genre_ids
        .iter()
        .map(|&genre_id| Relation::MovieGenre {
            movie_id: raw.id,
            genre_id,
        })
        .collect();

    let (cast, producers) = match credits {
        Some(c) => (top_cast(raw.id, c, cast_limit), producers(raw.id, c)),
        None => (Vec::new(), Vec::new()),
    };

    NormalizedMovie {
        movie,
        genres,
        cast,
        producers,
    }
}

/// Top-billed cast by the feed's `order` field. Entries without an order sort last.
fn top_cast(movie_id: i64, credits: &Credits, limit: usize) -> Vec<(PersonRow, Relation)> {
    let mut billed: Vec<_> = credits.cast.iter().collect();
    billed.sort_by_key(|m| m.order.unwrap_or(i32::MAX));

    billed
        .into_iter()
        .take(limit)
        .map(|m| {
            let person = PersonRow {
                id: m.id,
                name: m.name.clone(),
                gender: m.gender,
            };
            let role = Relation::MovieActor(MovieActorRow {
                movie_id,
                actor_id: m.id,
                character_name: m.character.clone().unwrap_or_default(),
                cast_order: m.order.unwrap_or(0),
            });
            (person, role)
        })
        .collect()
}

fn producers(movie_id: i64, credits: &Credits) -> Vec<(PersonRow, Relation)> {
    credits
        .crew
        .iter()
        .filter(|m| m.job.as_deref() == Some(PRODUCER_JOB))
        .map(|m| {
            let person = PersonRow {
                id: m.id,
                name: m.name.clone(),
                gender: None,
            };
            let link = Relation::MovieProducer {
                movie_id,
                producer_id: m.id,
            };
            (person, link)
        })
        .collect()
}

/// `YYYY-MM-DD` or nothing. The feed sends `""` for unknown dates.
fn parse_release_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}
