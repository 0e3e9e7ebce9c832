use rusqlite::Connection;
use tracing::{debug, info};

/// Groups loader writes into transactions of `every` movies.
///
/// `committed()` is the recovery checkpoint: movies counted there survive a
/// crash. Work after the last boundary is redone on the next run, which the
/// insert-if-absent writes make harmless.
#[derive(Debug)]
pub struct CommitController {
    every: usize,
    pending: usize,
    committed: usize,
}

impl CommitController {
    pub fn new(every: usize) -> Self {
        CommitController {
            every: every.max(1),
            pending: 0,
            committed: 0,
        }
    }

    /// Opens a transaction unless one is already open.
    pub fn begin(&self, conn: &Connection) -> rusqlite::Result<()> {
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    /// Counts one fully written movie. Returns true if this closed a batch.
    pub fn movie_loaded(&mut self, conn: &Connection) -> rusqlite::Result<bool> {
        self.pending += 1;
        if self.pending < self.every {
            return Ok(false);
        }
        self.commit(conn)?;
        self.begin(conn)?;
        Ok(true)
    }

    /// Final boundary for the run. Leaves the connection in autocommit mode.
    pub fn finish(&mut self, conn: &Connection) -> rusqlite::Result<()> {
        self.commit(conn)
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    fn commit(&mut self, conn: &Connection) -> rusqlite::Result<()> {
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        self.committed += self.pending;
        if self.pending > 0 {
            info!("Committed {} movies (checkpoint: {})", self.pending, self.committed);
        } else {
            debug!("Commit with no pending movies");
        }
        self.pending = 0;
        Ok(())
    }
}
