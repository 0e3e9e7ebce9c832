use std::collections::HashSet;

/// Movie ids already handled by this process.
///
/// Only saves repeated credits fetches when discovery pages overlap. It is
/// lost on restart; duplicates across runs are absorbed by the store's
/// insert-if-absent writes, never by this set.
#[derive(Debug, Default)]
pub struct SeenMovies {
    ids: HashSet<i64>,
}

impl SeenMovies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id` and reports whether it had been recorded before.
    pub fn mark_and_check(&mut self, id: i64) -> bool {
        !self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_sighting_is_reported() {
        let mut seen = SeenMovies::new();
        assert!(!seen.mark_and_check(550));
        assert!(seen.mark_and_check(550));
        assert!(!seen.mark_and_check(551));
        assert_eq!(seen.len(), 2);
    }
}
