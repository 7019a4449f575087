//! Cache statistics

use std::fmt;

/// Snapshot of the reservation registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Paths with a registry entry
    pub tracked_reservations: usize,
    /// Paths currently reserved by a task
    pub held_reservations: usize,
    /// Temp files handed out since creation
    pub temp_files_issued: u64,
    /// Successful commits since creation
    pub commits: u64,
}

impl CacheStats {
    /// Entries no task holds, removable by cleanup
    pub fn idle_reservations(&self) -> usize {
        self.tracked_reservations - self.held_reservations
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reservations ({} held), {} temp files, {} commits",
            self.tracked_reservations, self.held_reservations, self.temp_files_issued, self.commits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_reservations() {
        let stats = CacheStats {
            tracked_reservations: 5,
            held_reservations: 2,
            ..Default::default()
        };
        assert_eq!(stats.idle_reservations(), 3);
        assert!(stats.to_string().starts_with("5 reservations (2 held)"));
    }
}
