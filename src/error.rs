use thiserror::Error;

/// Failures surfaced by the catalog client.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("rate limited on {path} after {attempts} attempts")]
    RateLimited { path: String, attempts: u32 },

    #[error("{path} returned HTTP {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed payload from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures the loader cannot absorb. Relation rows whose parent is
/// missing are not errors; see `loader::Written::SkippedMissingParent`.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{table} row {id} references a missing parent row")]
    EntityOrdering { table: &'static str, id: i64 },

    #[error("store error writing {table}: {source}")]
    Store {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}
