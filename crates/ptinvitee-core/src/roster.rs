// ── Invitee roster pagination ──
//
// Trackers paginate rosters inconsistently: some ignore an out-of-range
// page parameter and serve the last page again, some serve an empty page,
// some never say how many pages exist. The fetcher stops on the first
// signal that the roster is exhausted and never loops forever.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::RosterLimits;
use crate::error::CoreError;
use crate::model::InviteeRecord;

/// One page of a site's roster.
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Fetch page `page_index`. Index 0 is the first page, which the
    /// fetcher is handed already parsed, so it requests indices from 1.
    async fn fetch_page(&self, page_index: usize) -> Result<Vec<InviteeRecord>, CoreError>;
}

/// Why pagination stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// A page held fewer records than a full page.
    ShortPage,
    /// A page held no records.
    EmptyPage,
    /// A page repeated the previous one; the duplicate was discarded.
    PaginationRepetitionDetected,
    /// The page cap was reached.
    MaxPages,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortPage => f.write_str("short page"),
            Self::EmptyPage => f.write_str("empty page"),
            Self::PaginationRepetitionDetected => f.write_str("pagination repetition detected"),
            Self::MaxPages => f.write_str("page cap reached"),
        }
    }
}

/// Merged roster and how the walk ended.
#[derive(Debug, Clone)]
pub struct RosterOutcome {
    pub invitees: Vec<InviteeRecord>,
    pub pages_fetched: usize,
    pub termination: TerminationReason,
}

/// Repetition signature: the set of identities on a page.
fn signature(page: &[InviteeRecord]) -> BTreeSet<String> {
    page.iter().map(|r| r.identity().to_string()).collect()
}

/// Walks a roster page by page under [`RosterLimits`].
#[derive(Debug, Clone, Copy)]
pub struct RosterFetcher {
    limits: RosterLimits,
}

impl RosterFetcher {
    pub fn new(limits: RosterLimits) -> Self {
        Self { limits }
    }

    /// Merge `first_page` with every following page `source` yields.
    ///
    /// A page that fails to load fails the whole roster: a truncated roster
    /// must never replace a complete one in the store.
    pub async fn collect(
        &self,
        first_page: Vec<InviteeRecord>,
        source: &dyn RosterSource,
    ) -> Result<RosterOutcome, CoreError> {
        let page_size = self.limits.page_size;
        let max_pages = self.limits.max_pages.max(1);

        let mut last_len = first_page.len();
        let mut previous = signature(&first_page);
        let mut invitees = first_page;
        let mut pages_fetched = 1;

        let termination = loop {
            if last_len < page_size {
                break TerminationReason::ShortPage;
            }
            if pages_fetched >= max_pages {
                warn!(max_pages, "roster page cap reached");
                break TerminationReason::MaxPages;
            }
            if !self.limits.page_delay.is_zero() {
                tokio::time::sleep(self.limits.page_delay).await;
            }

            let page_index = pages_fetched;
            let page = source.fetch_page(page_index).await.inspect_err(|e| {
                warn!(page = page_index + 1, error = %e, "roster page failed, discarding roster");
            })?;

            let current = signature(&page);
            if current.is_empty() {
                debug!(page = page_index + 1, "empty roster page");
                break TerminationReason::EmptyPage;
            }
            if current == previous {
                info!(
                    page = page_index + 1,
                    "PaginationRepetitionDetected: page repeats the previous one"
                );
                break TerminationReason::PaginationRepetitionDetected;
            }

            pages_fetched += 1;
            debug!(page = pages_fetched, count = page.len(), "roster page merged");
            last_len = page.len();
            previous = current;
            invitees.extend(page);
        };

        Ok(RosterOutcome {
            invitees,
            pages_fetched,
            termination,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Serves pre-built pages by index; past the end, repeats the last one.
    struct Scripted {
        pages: Vec<Result<Vec<InviteeRecord>, String>>,
        requested: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn new(pages: Vec<Result<Vec<InviteeRecord>, String>>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<usize> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RosterSource for Scripted {
        async fn fetch_page(&self, page_index: usize) -> Result<Vec<InviteeRecord>, CoreError> {
            self.requested.lock().unwrap().push(page_index);
            let idx = page_index.min(self.pages.len() - 1);
            self.pages[idx]
                .clone()
                .map_err(|reason| CoreError::Transport {
                    url: format!("page {page_index}"),
                    reason,
                })
        }
    }

    fn page(prefix: &str, n: usize) -> Vec<InviteeRecord> {
        (0..n)
            .map(|i| InviteeRecord {
                username: format!("{prefix}{i}"),
                ..InviteeRecord::default()
            })
            .collect()
    }

    fn limits(page_size: usize, max_pages: usize) -> RosterLimits {
        RosterLimits {
            page_size,
            max_pages,
            page_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn short_first_page_makes_no_requests() {
        let source = Scripted::new(vec![Ok(Vec::new())]);
        let out = RosterFetcher::new(limits(50, 100))
            .collect(page("a", 10), &source)
            .await
            .unwrap();
        assert_eq!(out.invitees.len(), 10);
        assert_eq!(out.termination, TerminationReason::ShortPage);
        assert!(source.requested().is_empty());
    }

    #[tokio::test]
    async fn walks_until_short_page() {
        let source = Scripted::new(vec![Ok(Vec::new()), Ok(page("b", 3)), Ok(page("c", 2))]);
        let out = RosterFetcher::new(limits(3, 100))
            .collect(page("a", 3), &source)
            .await
            .unwrap();
        assert_eq!(out.invitees.len(), 8);
        assert_eq!(out.pages_fetched, 3);
        assert_eq!(out.termination, TerminationReason::ShortPage);
        assert_eq!(source.requested(), vec![1, 2]);
    }

    #[tokio::test]
    async fn repeated_last_page_is_discarded() {
        // The site keeps serving page "b" for every index past 1.
        let source = Scripted::new(vec![Ok(Vec::new()), Ok(page("b", 3))]);
        let out = RosterFetcher::new(limits(3, 100))
            .collect(page("a", 3), &source)
            .await
            .unwrap();
        assert_eq!(out.invitees.len(), 6);
        assert_eq!(out.termination, TerminationReason::PaginationRepetitionDetected);
        assert_eq!(source.requested(), vec![1, 2]);
    }

    #[tokio::test]
    async fn page_identical_to_first_stops_immediately() {
        let source = Scripted::new(vec![Ok(page("a", 3))]);
        let out = RosterFetcher::new(limits(3, 100))
            .collect(page("a", 3), &source)
            .await
            .unwrap();
        assert_eq!(out.invitees.len(), 3);
        assert_eq!(out.pages_fetched, 1);
        assert_eq!(out.termination, TerminationReason::PaginationRepetitionDetected);
    }

    #[tokio::test]
    async fn empty_page_stops() {
        let source = Scripted::new(vec![Ok(Vec::new()), Ok(Vec::new())]);
        let out = RosterFetcher::new(limits(3, 100))
            .collect(page("a", 3), &source)
            .await
            .unwrap();
        assert_eq!(out.invitees.len(), 3);
        assert_eq!(out.termination, TerminationReason::EmptyPage);
    }

    #[tokio::test]
    async fn page_cap_bounds_requests() {
        // Every page is full and distinct: only the cap stops the walk.
        let pages = (0..10).map(|i| Ok(page(&format!("p{i}-"), 2))).collect();
        let source = Scripted::new(pages);
        let out = RosterFetcher::new(limits(2, 4))
            .collect(page("first-", 2), &source)
            .await
            .unwrap();
        assert_eq!(out.pages_fetched, 4);
        assert_eq!(out.invitees.len(), 8);
        assert_eq!(out.termination, TerminationReason::MaxPages);
        assert_eq!(source.requested(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn fetch_error_fails_the_roster() {
        let source = Scripted::new(vec![
            Ok(Vec::new()),
            Ok(page("b", 2)),
            Err("connection reset".into()),
        ]);
        let err = RosterFetcher::new(limits(2, 100))
            .collect(page("a", 2), &source)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Transport { ref reason, .. } if reason == "connection reset"));
        assert_eq!(source.requested(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn page_delay_is_applied_between_requests() {
        let source = Scripted::new(vec![Ok(Vec::new()), Ok(page("b", 1))]);
        let fetcher = RosterFetcher::new(RosterLimits {
            page_size: 2,
            max_pages: 10,
            page_delay: Duration::from_secs(2),
        });
        let start = tokio::time::Instant::now();
        let out = fetcher.collect(page("a", 2), &source).await.unwrap();
        assert_eq!(out.invitees.len(), 3);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
