use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics::payload::ScreenerResponse;
use crate::session::{SessionTransport, TransportRequest};
use serde_json::json;
use tracing::{debug, error, info, warn};

/// Lifecycle of the session behind the pager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PagerState {
    Active,
    Restarting,
    Failed,
}

/// One page of screener symbols, with the paging bound derived from its count.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenerPage {
    pub symbols: Vec<String>,
    pub total_pages: u32,
    pub total_count: u64,
}

/// Number of pages needed for `count` results.
///
/// ```rust
/// use quantrank_spider::screener::total_pages;
///
/// assert_eq!(total_pages(4213, 100), 43);
/// assert_eq!(total_pages(4200, 100), 42);
/// assert_eq!(total_pages(0, 100), 0);
/// ```
pub fn total_pages(count: u64, page_size: u32) -> u32 {
    count.div_ceil(u64::from(page_size.max(1))) as u32
}

/// Walks the fixed quant-rating screen page by page, restarting the session on schedule.
pub struct ScreenerPager<T> {
    transport: T,
    state: PagerState,
    page_size: u32,
    min_count: u64,
    restart_every: u32,
    listing_url: String,
    api_url: String,
}

impl<T: SessionTransport> ScreenerPager<T> {
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport,
            state: PagerState::Active,
            page_size: config.page_size,
            min_count: config.min_count,
            restart_every: config.restart_every,
            listing_url: config.listing_url(),
            api_url: config.screener_url(),
        }
    }

    pub fn state(&self) -> PagerState {
        self.state
    }

    /// Transport for requests that share the pager's session.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Open the session and load the listing page.
    pub async fn open(&mut self) -> Result<()> {
        self.transport
            .open(&self.listing_url)
            .await
            .map_err(|err| {
                error!("could not open screener session, error({err})");
                self.state = PagerState::Failed;
                err
            })?;
        self.state = PagerState::Active;
        Ok(())
    }

    /// Close the session, persisting its state.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }

    pub async fn fetch_page(&mut self, page: u32) -> Result<ScreenerPage> {
        if self.restart_every > 0 && page % self.restart_every == 0 {
            self.restart(page).await?;
        }
        if self.state == PagerState::Failed {
            return Err(Error::TransportFailure(
                "screener session has failed".into(),
            ));
        }

        let body = json!({
            "filter": { "quant_rating": { "gte": 1, "lte": 5, "exclude": false } },
            "page": page,
            "per_page": self.page_size,
            "sort": null,
            "total_count": true,
            "type": "stock",
        });
        let response = self
            .transport
            .send(TransportRequest::post_json(&self.api_url, body))
            .await?;

        if response.status != 200 {
            error!("screener page {page} returned status {}", response.status);
            return Err(Error::InvalidResponseStatus {
                url: self.api_url.clone(),
                status: response.status,
            });
        }

        let screener: ScreenerResponse =
            serde_json::from_slice(&response.body).map_err(|err| {
                error!("failed to decode screener page {page}, error({err})");
                Error::MalformedPayload {
                    url: self.api_url.clone(),
                    reason: err.to_string(),
                }
            })?;

        let total_count = screener.meta.count;
        if total_count < self.min_count {
            error!(
                "screener matched {total_count} tickers, below the threshold of {}",
                self.min_count
            );
            return Err(Error::BelowThresholdResult {
                count: total_count,
                threshold: self.min_count,
            });
        }

        let page = ScreenerPage {
            symbols: screener
                .data
                .into_iter()
                .map(|item| item.attributes.slug)
                .collect(),
            total_pages: total_pages(total_count, self.page_size),
            total_count,
        };
        debug!(
            "screener page: {} symbols, {} of {} pages",
            page.symbols.len(),
            page.total_pages,
            total_count
        );
        Ok(page)
    }

    async fn restart(&mut self, page: u32) -> Result<()> {
        if self.state == PagerState::Failed {
            return Err(Error::TransportFailure(
                "screener session has failed".into(),
            ));
        }

        info!("restarting session before page {page}");
        self.state = PagerState::Restarting;
        if let Err(err) = self.transport.close().await {
            warn!("error while closing session, error({err})");
        }

        match self.transport.open(&self.listing_url).await {
            Ok(()) => {
                self.state = PagerState::Active;
                Ok(())
            }
            Err(err) => {
                error!("could not reopen session before page {page}, error({err})");
                self.state = PagerState::Failed;
                Err(Error::TransportFailure(format!(
                    "session restart before page {page} failed: {err}"
                )))
            }
        }
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
