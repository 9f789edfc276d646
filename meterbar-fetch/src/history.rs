//! Paged billing history.
//!
//! Some vendors expose per-day spend in a paged table. A [`HistorySource`]
//! reads one page at a time; the store's backfill task walks the pages and
//! persists what it finds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use meterbar_core::{DailySample, ModelUsage, ProviderKind};

use crate::context::FetchContext;
use crate::error::FetchError;

/// Default number of pages a backfill reads.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// One page of billing history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Per-day billed amounts.
    pub samples: Vec<DailySample>,
    /// Per-model request totals found on this page.
    pub models: Vec<ModelUsage>,
}

impl HistoryPage {
    /// Returns true if the page carried no rows.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.models.is_empty()
    }
}

/// A paged source of per-day cost history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// The provider this history belongs to.
    fn provider(&self) -> ProviderKind;

    /// Reads page `page` (1-based).
    async fn fetch_page(&self, ctx: &FetchContext, page: u32) -> Result<HistoryPage, FetchError>;

    /// Upper bound on pages read per backfill.
    fn max_pages(&self) -> u32 {
        DEFAULT_MAX_PAGES
    }
}
