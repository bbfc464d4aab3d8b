use crate::error::{Error, Result};
use crate::http::*;
use crate::record::{MetricRecord, ResolvedRecord};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info, warn};

/// Minimum Jaro-Winkler similarity of company names before a link is claimed.
pub const SIMILARITY_THRESHOLD: f64 = 0.70;

/// Exchanges whose tickers are not expected to be in the reference table.
static UNLISTED_EXCHANGES: [&str; 6] = [
    "OTCQX",
    "OTCQB",
    "OTC Markets",
    "Grey Market",
    "Pink No Info",
    "Pink Current Info",
];

/// A row of the reference (identity) table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceTicker {
    pub composite_figi: String,
    pub symbol: String,
    pub company_name: String,
    pub active: bool,
    pub ticker_id: Option<i32>,
}

/// Read & conditional-write access to the reference table.
#[allow(async_fn_in_trait)]
pub trait IdentityStore {
    /// Active rows with both an external ticker id and a composite figi.
    async fn linked(&self) -> Result<Vec<ReferenceTicker>>;

    /// An active row for `symbol` with a composite figi and no external ticker id.
    async fn candidate(&self, symbol: &str) -> Result<Option<ReferenceTicker>>;

    /// Link `ticker_id` to the row, only while it is still unlinked; returns rows affected.
    async fn claim(&self, ticker_id: i32, composite_figi: &str, symbol: &str) -> Result<u64>;
}

/// Case-insensitive Jaro-Winkler similarity of two company names.
///
/// ```rust
/// use quantrank_spider::identity::similarity;
///
/// assert_eq!(similarity("Apple Inc.", "APPLE INC."), 1.0);
/// assert!(similarity("Apple Inc.", "Exxon Mobil Corp") < 0.70);
/// ```
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(&a.to_lowercase(), &b.to_lowercase())
}

/// Whether missing links on `exchange` deserve a diagnostic.
pub fn is_listed_exchange(exchange: &str) -> bool {
    !UNLISTED_EXCHANGES.contains(&exchange)
}

// resolver
// -------------------------------------------------------------------------------------------------

/// Attaches composite identifiers to records, claiming new links where it is safe to.
pub struct IdentityResolver<S> {
    store: S,
    threshold: f64,
}

impl<S: IdentityStore> IdentityResolver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            threshold: SIMILARITY_THRESHOLD,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve every record; records that cannot be linked are kept, unresolved.
    pub async fn resolve(&self, records: Vec<MetricRecord>) -> Vec<ResolvedRecord> {
        let time = std::time::Instant::now();

        let linked: HashMap<i32, ReferenceTicker> = match self.store.linked().await {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| row.ticker_id.map(|id| (id, row)))
                .collect(),
            Err(err) => {
                error!("failed to load linked tickers, error({err})");
                HashMap::new()
            }
        };
        debug!("{} linked tickers loaded", linked.len());

        // known links first; everything else is queued by symbol
        let mut resolved: Vec<ResolvedRecord> = Vec::with_capacity(records.len());
        let mut unresolved: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            let figi = linked
                .get(&record.ticker_id)
                .filter(|row| row.symbol == record.ticker)
                .map(|row| row.composite_figi.clone());
            if figi.is_none() {
                unresolved.insert(record.ticker.clone(), resolved.len());
            }
            resolved.push(ResolvedRecord {
                record,
                composite_figi: figi,
            });
        }

        let mut claimed = 0;
        for (symbol, index) in unresolved {
            let outcome = self.link(&resolved[index].record).await;
            match outcome {
                Ok(Some(figi)) => {
                    info!("linked {symbol} to {figi}");
                    resolved[index].composite_figi = Some(figi);
                    claimed += 1;
                }
                Ok(None) => {}
                Err(err) if !err.is_fatal() => warn!("{err}"),
                Err(err) => error!("could not link {symbol}, error({err})"),
            }
        }

        info!(
            "{} of {} records resolved, {claimed} newly linked, {}",
            resolved.iter().filter(|r| r.is_resolved()).count(),
            resolved.len(),
            crate::time_elapsed(time)
        );
        resolved
    }

    /// Try to claim a reference row for an unresolved record.
    async fn link(&self, record: &MetricRecord) -> Result<Option<String>> {
        let listed = is_listed_exchange(&record.exchange);
        if listed {
            info!(
                "{} ({}) is not linked to a reference ticker",
                record.ticker, record.ticker_id
            );
        }

        let Some(candidate) = self.store.candidate(&record.ticker).await? else {
            if listed {
                warn!(
                    "no unlinked reference ticker for {} ({})",
                    record.ticker, record.ticker_id
                );
            }
            return Ok(None);
        };

        if candidate.company_name.trim().is_empty() || record.company_name.trim().is_empty() {
            return Err(Error::IdentityLinkRejected {
                symbol: record.ticker.clone(),
                reason: "company name missing on one side".to_string(),
            });
        }

        let score = similarity(&candidate.company_name, &record.company_name);
        if score < self.threshold {
            return Err(Error::IdentityLinkRejected {
                symbol: record.ticker.clone(),
                reason: format!(
                    "company names too dissimilar ({score:.2}): {:?} vs {:?}",
                    candidate.company_name, record.company_name
                ),
            });
        }

        let affected = self
            .store
            .claim(record.ticker_id, &candidate.composite_figi, &candidate.symbol)
            .await?;
        if affected == 0 {
            warn!("{} was claimed concurrently; leaving it unresolved", record.ticker);
            return Ok(None);
        }

        Ok(Some(candidate.composite_figi))
    }
}

// postgres
// -------------------------------------------------------------------------------------------------

/// [`IdentityStore`] over the Postgres reference table.
pub struct PgIdentityStore {
    pool: PgPool,
    table: String,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
        }
    }
}

impl IdentityStore for PgIdentityStore {
    async fn linked(&self) -> Result<Vec<ReferenceTicker>> {
        let pg_client = self.pool.get().await?;
        let rows = pg_client
            .query(crate::sql::select_linked(&self.table).as_str(), &[])
            .await
            .map_err(|err| {
                error!("failed to fetch {}, error({err})", self.table);
                err
            })?;

        rows.into_iter()
            .map(|row| -> Result<ReferenceTicker> {
                Ok(ReferenceTicker {
                    symbol: row.try_get(0)?,
                    ticker_id: row.try_get(1)?,
                    composite_figi: row.try_get(2)?,
                    active: true,
                    ..Default::default()
                })
            })
            .collect()
    }

    async fn candidate(&self, symbol: &str) -> Result<Option<ReferenceTicker>> {
        let pg_client = self.pool.get().await?;
        let rows = pg_client
            .query(crate::sql::select_candidate(&self.table).as_str(), &[&symbol])
            .await?;

        match rows.first() {
            Some(row) => Ok(Some(ReferenceTicker {
                company_name: row.try_get::<_, Option<String>>(0)?.unwrap_or_default(),
                composite_figi: row.try_get(1)?,
                symbol: row.try_get(2)?,
                active: true,
                ticker_id: None,
            })),
            None => Ok(None),
        }
    }

    async fn claim(&self, ticker_id: i32, composite_figi: &str, symbol: &str) -> Result<u64> {
        let pg_client = self.pool.get().await?;
        let affected = pg_client
            .execute(
                crate::sql::claim_link(&self.table).as_str(),
                &[&ticker_id, &composite_figi, &symbol],
            )
            .await
            .map_err(|err| {
                error!("failed to link {symbol} to {composite_figi}, error({err})");
                err
            })?;
        Ok(affected)
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[test]
fn otc_exchanges_are_unlisted() {
    assert!(!is_listed_exchange("OTCQX"));
    assert!(!is_listed_exchange("Pink Current Info"));
    assert!(is_listed_exchange("NYSE"));
    assert!(is_listed_exchange("NASDAQ"));
}

#[test]
fn similarity_ignores_case() {
    assert_eq!(
        similarity("Exxon Mobil Corporation", "EXXON MOBIL CORPORATION"),
        1.0
    );
    assert!(similarity("Exxon Mobil Corp", "Exxon Mobil Corporation") >= SIMILARITY_THRESHOLD);
}
