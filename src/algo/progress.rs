//! Progress reporting for long-running searches.
//!
//! Search drivers call a [`Progress`] callback once per iteration with a
//! [`SearchStats`] snapshot.
//!
//! # Example
//!
//! ```
//! use layout_embedding::algo::progress::Progress;
//!
//! let progress = Progress::new(|stats| {
//!     println!(
//!         "[{}] LB {:.3} UB {:.3} gap {:.1}%",
//!         stats.iteration,
//!         stats.lower_bound,
//!         stats.upper_bound,
//!         stats.gap * 100.0
//!     );
//! });
//! # let _ = progress;
//! ```

/// A snapshot of a running search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchStats {
    /// Number of search nodes evaluated so far.
    pub iteration: usize,
    /// Embedded layout edges at the current node.
    pub embedded: usize,
    /// Conflicting layout edges at the current node.
    pub conflicting: usize,
    /// Non-conflicting layout edges at the current node.
    pub non_conflicting: usize,
    /// Lower bound of the current node.
    pub lower_bound: f64,
    /// Cost of the best complete embedding found so far (infinite if none).
    pub upper_bound: f64,
    /// Relative gap between `lower_bound` and `upper_bound`.
    pub gap: f64,
    /// Number of nodes waiting in the queue.
    pub queue_len: usize,
}

/// A progress callback that receives a [`SearchStats`] snapshot per iteration.
pub struct Progress {
    callback: Box<dyn Fn(&SearchStats) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&SearchStats) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, stats: &SearchStats) {
        (self.callback)(stats);
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_callback_receives_snapshots() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let progress = Progress::new(move |stats| {
            assert_eq!(stats.queue_len, 3);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let stats = SearchStats {
            iteration: 1,
            embedded: 0,
            conflicting: 2,
            non_conflicting: 2,
            lower_bound: 1.0,
            upper_bound: f64::INFINITY,
            gap: 1.0,
            queue_len: 3,
        };
        progress.report(&stats);
        progress.report(&stats);
        Progress::none().report(&stats);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
