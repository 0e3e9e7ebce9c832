//! Page loop: taxonomy first, then discovery pages until a stop condition.
//!
//! One page is fetched, expanded and written before the next is requested.
//! Failures are classified here: page-level problems end the loop early but
//! keep what was committed; loader and commit errors abort the run.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::catalog::models::RawMovie;
use crate::catalog::transport::Transport;
use crate::catalog::{CatalogClient, PageOutcome};
use crate::commit::CommitController;
use crate::config::Settings;
use crate::db::{GenreRow, PersonKind, Store};
use crate::dedup::SeenMovies;
use crate::error::LoadError;
use crate::loader::{self, Written};
use crate::normalize::{normalize, NormalizedMovie};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Bootstrapping,
    FetchingPage,
    ExtractingRecords,
    Loading,
    Committing,
    Draining,
    Done,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    EndOfStream,
    PageCap,
    PageFailed,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub target_movies: usize,
    pub page_cap: u32,
    pub commit_every: usize,
    pub cast_limit: usize,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        RunOptions {
            target_movies: settings.target_movies,
            page_cap: settings.page_cap,
            commit_every: settings.commit_every,
            cast_limit: settings.cast_limit,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub genres: usize,
    pub pages_fetched: u32,
    /// Last discovery page requested, including an empty or failed one.
    pub last_page: u32,
    pub movies_loaded: usize,
    pub movies_committed: usize,
    pub duplicates_skipped: usize,
    pub details_missing: usize,
    pub relations_inserted: usize,
    pub relations_present: usize,
    pub relations_skipped: usize,
    pub stop: Option<StopReason>,
}

/// Run one ingestion against `store`. The final commit happens on both the
/// success and the abort path; closing the store is left to the caller.
pub async fn run<T: Transport>(
    client: &CatalogClient<T>,
    store: &Store,
    opts: &RunOptions,
) -> Result<RunSummary> {
    let mut pipeline = Pipeline::new(store, opts)?;
    let outcome = pipeline.drive(client).await;
    let finished = pipeline.commits.finish(store.conn());
    pipeline.progress.finish_and_clear();
    pipeline.summary.movies_committed = pipeline.commits.committed();

    match outcome {
        Ok(()) => {
            finished.context("Final commit failed")?;
            pipeline.enter(Phase::Done);
            Ok(pipeline.summary)
        }
        Err(e) => {
            if let Err(commit_err) = finished {
                error!("Final commit after abort failed: {}", commit_err);
            }
            pipeline.enter(Phase::Aborted);
            error!(
                "Aborted after {} committed movies: {:#}",
                pipeline.summary.movies_committed, e
            );
            Err(e)
        }
    }
}

struct Pipeline<'a> {
    store: &'a Store,
    opts: &'a RunOptions,
    phase: Phase,
    seen: SeenMovies,
    commits: CommitController,
    summary: RunSummary,
    progress: ProgressBar,
}

impl<'a> Pipeline<'a> {
    fn new(store: &'a Store, opts: &'a RunOptions) -> Result<Self> {
        let progress = ProgressBar::new(opts.target_movies as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} movies ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );
        Ok(Pipeline {
            store,
            opts,
            phase: Phase::Bootstrapping,
            seen: SeenMovies::new(),
            commits: CommitController::new(opts.commit_every),
            summary: RunSummary::default(),
            progress,
        })
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!("{:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    async fn drive<T: Transport>(&mut self, client: &CatalogClient<T>) -> Result<()> {
        self.enter(Phase::Bootstrapping);
        self.bootstrap(client).await?;

        let mut page = 1u32;
        let stop = loop {
            if self.summary.movies_loaded >= self.opts.target_movies {
                break StopReason::TargetReached;
            }
            if page > self.opts.page_cap {
                info!("Page cap of {} reached", self.opts.page_cap);
                break StopReason::PageCap;
            }

            self.enter(Phase::FetchingPage);
            info!(
                "Fetching page {} (total movies: {})",
                page, self.summary.movies_loaded
            );
            self.summary.last_page = page;
            let records = match client.fetch_page(page).await {
                Ok(PageOutcome::Records(records)) => records,
                Ok(PageOutcome::EndOfStream) => {
                    info!("Page {} came back empty, no more results", page);
                    break StopReason::EndOfStream;
                }
                Err(e) => {
                    error!("Stopping at page {}: {}", page, e);
                    break StopReason::PageFailed;
                }
            };
            self.summary.pages_fetched += 1;

            self.enter(Phase::ExtractingRecords);
            for raw in &records {
                if self.summary.movies_loaded >= self.opts.target_movies {
                    break;
                }
                self.ingest_record(client, raw).await?;
            }
            page += 1;
        };

        self.enter(Phase::Draining);
        self.summary.stop = Some(stop);
        info!(
            "Stopped ({:?}): {} movies over {} pages, {} unique ids seen",
            stop,
            self.summary.movies_loaded,
            self.summary.pages_fetched,
            self.seen.len()
        );
        Ok(())
    }

    /// Genres go in and are committed before any movie can reference them.
    async fn bootstrap<T: Transport>(&mut self, client: &CatalogClient<T>) -> Result<()> {
        let store = self.store;
        let conn = store.conn();
        self.commits.begin(conn)?;

        let genres = client
            .fetch_taxonomy()
            .await
            .context("Failed to fetch genre list")?;
        for g in &genres {
            loader::upsert_genre(
                conn,
                &GenreRow {
                    id: g.id,
                    name: g.name.clone(),
                },
            )?;
        }
        self.commits.finish(conn).context("Failed to commit genres")?;
        self.commits.begin(conn)?;

        self.summary.genres = genres.len();
        info!("Genres populated ({})", genres.len());
        Ok(())
    }

    async fn ingest_record<T: Transport>(
        &mut self,
        client: &CatalogClient<T>,
        raw: &RawMovie,
    ) -> Result<()> {
        if self.seen.mark_and_check(raw.id) {
            debug!("Movie {} already handled this run", raw.id);
            self.summary.duplicates_skipped += 1;
            return Ok(());
        }

        let credits = match client.fetch_detail(raw.id).await {
            Ok(credits) => Some(credits),
            Err(e) => {
                warn!("Loading movie {} without credits: {}", raw.id, e);
                self.summary.details_missing += 1;
                None
            }
        };
        let normalized = normalize(raw, credits.as_ref(), self.opts.cast_limit);
        debug!(
            "Movie {}: {} relation rows",
            raw.id,
            normalized.relation_count()
        );

        self.enter(Phase::Loading);
        self.load(&normalized)?;
        self.summary.movies_loaded += 1;
        self.progress.inc(1);

        if self.commits.movie_loaded(self.store.conn())? {
            self.enter(Phase::Committing);
            info!("Processed {} movies...", self.summary.movies_loaded);
        }
        self.enter(Phase::ExtractingRecords);
        Ok(())
    }

    /// Movie, then genre links, then each person before its link.
    fn load(&mut self, n: &NormalizedMovie) -> Result<(), LoadError> {
        let store = self.store;
        let conn = store.conn();
        loader::upsert_movie(conn, &n.movie)?;

        for rel in &n.genres {
            let written = loader::upsert_relation(conn, rel)?;
            self.tally(written);
        }
        for (actor, role) in &n.cast {
            loader::upsert_person(conn, PersonKind::Actor, actor)?;
            let written = loader::upsert_relation(conn, role)?;
            self.tally(written);
        }
        for (producer, link) in &n.producers {
            loader::upsert_person(conn, PersonKind::Producer, producer)?;
            let written = loader::upsert_relation(conn, link)?;
            self.tally(written);
        }
        Ok(())
    }

    fn tally(&mut self, written: Written) {
        match written {
            Written::Inserted => self.summary.relations_inserted += 1,
            Written::AlreadyPresent => self.summary.relations_present += 1,
            Written::SkippedMissingParent => self.summary.relations_skipped += 1,
        }
    }
}
