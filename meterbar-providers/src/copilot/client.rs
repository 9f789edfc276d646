//! Cookie-authenticated client for GitHub's billing pages.

use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use meterbar_fetch::{FetchContext, FetchError, HistoryPage, HttpError, Secret, ensure_success};

use super::billing::{UsageCard, find_customer_id, parse_usage_table};

/// Billing period selector the usage endpoints expect (current month).
const PERIOD: u32 = 3;

/// Reads billing documents with one browser session.
#[derive(Debug)]
pub struct BillingClient {
    base_url: String,
    cookies: Secret,
    customer_id: OnceCell<String>,
}

impl BillingClient {
    /// Creates a client for `base_url` (e.g. `https://github.com`).
    pub fn new(base_url: impl Into<String>, cookies: Secret) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookies,
            customer_id: OnceCell::new(),
        }
    }

    /// URL of the billing settings page.
    pub fn billing_page_url(&self) -> String {
        format!("{}/settings/billing", self.base_url)
    }

    /// URL of the usage card.
    pub fn usage_card_url(&self, customer_id: &str) -> String {
        format!(
            "{}/settings/billing/copilot_usage_card?customer_id={customer_id}&period={PERIOD}",
            self.base_url
        )
    }

    /// URL of one usage table page.
    pub fn usage_table_url(&self, customer_id: &str, page: u32) -> String {
        format!(
            "{}/settings/billing/copilot_usage_table?customer_id={customer_id}&group=0&period={PERIOD}&query=&page={page}",
            self.base_url
        )
    }

    async fn get_text(&self, ctx: &FetchContext, url: &str) -> Result<String, FetchError> {
        let response = ctx.http.get_with_cookies(url, &self.cookies).await?;
        let response = ensure_success(response)?;
        Ok(response.text().await.map_err(HttpError::from)?)
    }

    /// Returns the billing customer id, scraping it once per client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::AuthenticationFailed`] when the page has no id.
    pub async fn customer_id(&self, ctx: &FetchContext) -> Result<&str, FetchError> {
        let id = self
            .customer_id
            .get_or_try_init(|| async {
                let html = self.get_text(ctx, &self.billing_page_url()).await?;
                let id = find_customer_id(&html)?;
                debug!("Resolved billing customer id");
                Ok::<_, FetchError>(id)
            })
            .await?;
        Ok(id.as_str())
    }

    /// Reads the current period's usage card.
    ///
    /// # Errors
    ///
    /// Returns an error if either request fails or the card is malformed.
    #[instrument(skip(self, ctx))]
    pub async fn usage_card(&self, ctx: &FetchContext) -> Result<UsageCard, FetchError> {
        let customer_id = self.customer_id(ctx).await?;
        let body = self.get_text(ctx, &self.usage_card_url(customer_id)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Reads one page of the daily usage table.
    ///
    /// # Errors
    ///
    /// Returns an error if either request fails or the table is malformed.
    #[instrument(skip(self, ctx))]
    pub async fn usage_table(&self, ctx: &FetchContext, page: u32) -> Result<HistoryPage, FetchError> {
        let customer_id = self.customer_id(ctx).await?;
        let body = self.get_text(ctx, &self.usage_table_url(customer_id, page)).await?;
        parse_usage_table(&body)
    }
}
