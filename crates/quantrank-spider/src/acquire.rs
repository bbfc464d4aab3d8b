use crate::config::Config;
use crate::error::Result;
use crate::metrics::{MetricsFetcher, RecordNormalizer};
use crate::record::MetricRecord;
use crate::screener::ScreenerPager;
use crate::session::SessionTransport;
use crate::tui::{self, Progress};
use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

/// One acquisition run: every screener page, every metric group, folded into records.
pub struct Acquisition<'a> {
    config: &'a Config,
    date: NaiveDate,
    tui: bool,
}

impl<'a> Acquisition<'a> {
    pub fn new(config: &'a Config, date: NaiveDate) -> Self {
        Self {
            config,
            date,
            tui: false,
        }
    }

    /// Show progress bars instead of relying on log output.
    pub fn with_tui(mut self, tui: bool) -> Self {
        self.tui = tui;
        self
    }

    /// Run the acquisition over `transport`.
    ///
    /// Any page or group failure aborts the run; the session is closed (and its state
    /// persisted) either way.
    pub async fn run<T: SessionTransport>(&self, transport: T) -> Result<Vec<MetricRecord>> {
        let time = std::time::Instant::now();
        let mut pager = ScreenerPager::new(transport, self.config);
        let mut normalizer = RecordNormalizer::new(self.date);

        pager.open().await?;
        let walked = self.walk(&mut pager, &mut normalizer).await;
        if let Err(err) = pager.close().await {
            warn!("could not close session, error({err})");
        }
        let pages = walked.map_err(|err| {
            error!("acquisition aborted, error({err})");
            err
        })?;

        let records = normalizer.finish();
        info!(
            "acquired {} records over {pages} pages, {}",
            records.len(),
            crate::time_elapsed(time)
        );
        Ok(records)
    }

    /// Page through the screener, returning the number of pages fetched.
    async fn walk<T: SessionTransport>(
        &self,
        pager: &mut ScreenerPager<T>,
        normalizer: &mut RecordNormalizer,
    ) -> Result<u32> {
        let progress = self.progress(self.config.groups.len() as u64);
        let walked = self.walk_pages(pager, normalizer, &progress).await;
        progress.finish();
        walked
    }

    async fn walk_pages<T: SessionTransport>(
        &self,
        pager: &mut ScreenerPager<T>,
        normalizer: &mut RecordNormalizer,
        progress: &Progress,
    ) -> Result<u32> {
        let groups = &self.config.groups;
        let fetcher = MetricsFetcher::new(self.config.request_delay);

        let mut page = 1;
        let mut total_pages = 1;
        while page <= total_pages {
            let screener = pager.fetch_page(page).await?;
            total_pages = screener.total_pages;
            progress.pages.set_length(u64::from(total_pages));
            debug!(
                "page {page} of {total_pages}: {} symbols",
                screener.symbols.len()
            );

            if screener.symbols.is_empty() {
                warn!("screener page {page} has no symbols");
            } else {
                progress.groups.reset();
                for group in groups {
                    let spinner = tui::multi_progress_spinner(
                        progress.multi.as_ref(),
                        format!("fetching {} metrics ...", group.name),
                    );
                    let payload = tui::with_spinner(
                        spinner,
                        fetcher.fetch_group(pager.transport_mut(), group, &screener.symbols),
                    )
                    .await?;
                    normalizer.merge(&payload);
                    progress.groups.inc(1);
                }
            }

            progress.pages.inc(1);
            page += 1;
        }
        debug!("{} records folded", normalizer.len());

        Ok(page - 1)
    }

    fn progress(&self, groups: u64) -> Progress {
        if !self.tui {
            return Progress::hidden();
        }
        tui::multi_progress(1, groups).unwrap_or_else(|err| {
            warn!("progress bars unavailable, error({err})");
            Progress::hidden()
        })
    }
}
