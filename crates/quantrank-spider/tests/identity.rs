use quantrank_spider::identity::{IdentityResolver, IdentityStore, ReferenceTicker};
use quantrank_spider::record::MetricRecord;
use quantrank_spider::{Error, Result};
use tokio::sync::Mutex;

/// Reference table held in memory, with the same conditional claim as the database.
#[derive(Default)]
struct MemoryStore {
    rows: Mutex<Vec<ReferenceTicker>>,
    claims: Mutex<u32>,
    broken_lookup: bool,
    lose_claims: bool,
}

impl MemoryStore {
    fn with(rows: Vec<ReferenceTicker>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }
}

impl IdentityStore for MemoryStore {
    async fn linked(&self) -> Result<Vec<ReferenceTicker>> {
        if self.broken_lookup {
            return Err(Error::TransportFailure("connection reset".into()));
        }
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|row| row.active && row.ticker_id.is_some() && !row.composite_figi.is_empty())
            .cloned()
            .collect())
    }

    async fn candidate(&self, symbol: &str) -> Result<Option<ReferenceTicker>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|row| {
                row.active
                    && row.ticker_id.is_none()
                    && !row.composite_figi.is_empty()
                    && row.symbol == symbol
            })
            .cloned())
    }

    async fn claim(&self, ticker_id: i32, composite_figi: &str, symbol: &str) -> Result<u64> {
        *self.claims.lock().await += 1;
        if self.lose_claims {
            return Ok(0);
        }

        let mut rows = self.rows.lock().await;
        let mut affected = 0;
        for row in rows.iter_mut().filter(|row| {
            row.active
                && row.ticker_id.is_none()
                && row.composite_figi == composite_figi
                && row.symbol == symbol
        }) {
            row.ticker_id = Some(ticker_id);
            affected += 1;
        }
        Ok(affected)
    }
}

fn row(symbol: &str, figi: &str, name: &str, active: bool, ticker_id: Option<i32>) -> ReferenceTicker {
    ReferenceTicker {
        composite_figi: figi.into(),
        symbol: symbol.into(),
        company_name: name.into(),
        active,
        ticker_id,
    }
}

fn record(symbol: &str, ticker_id: i32, name: &str) -> MetricRecord {
    MetricRecord {
        ticker: symbol.into(),
        ticker_id,
        company_name: name.into(),
        exchange: "NYSE".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn known_link_resolves_without_a_claim() {
    let store = MemoryStore::with(vec![row("AAPL", "BBG000B9XRY4", "Apple Inc", true, Some(146))]);
    let resolver = IdentityResolver::new(store);

    let resolved = resolver.resolve(vec![record("AAPL", 146, "Apple Inc.")]).await;
    assert_eq!(resolved[0].composite_figi.as_deref(), Some("BBG000B9XRY4"));
    assert_eq!(*resolver.store().claims.lock().await, 0);
}

#[tokio::test]
async fn unlinked_row_is_claimed_exactly_once() {
    let store = MemoryStore::with(vec![row(
        "XOM",
        "BBG000GZQ728",
        "Exxon Mobil Corporation",
        true,
        None,
    )]);
    let resolver = IdentityResolver::new(store);

    let resolved = resolver
        .resolve(vec![record("XOM", 42, "Exxon Mobil Corp")])
        .await;
    assert_eq!(resolved[0].composite_figi.as_deref(), Some("BBG000GZQ728"));
    assert_eq!(
        resolver.store().rows.lock().await[0].ticker_id,
        Some(42)
    );

    // a later record with the same symbol but another id finds nothing left to claim
    let resolved = resolver
        .resolve(vec![record("XOM", 43, "Exxon Mobil Corp")])
        .await;
    assert!(!resolved[0].is_resolved());
    assert_eq!(
        resolver.store().rows.lock().await[0].ticker_id,
        Some(42)
    );
    assert_eq!(*resolver.store().claims.lock().await, 1);
}

#[tokio::test]
async fn only_active_unlinked_rows_are_candidates() {
    let store = MemoryStore::with(vec![
        row("XOM", "BBG000GZQ728", "Exxon Mobil Corporation", true, Some(999)),
        row("XOM", "BBG000XOMOLD", "Exxon Mobil Corporation", false, None),
    ]);
    let resolver = IdentityResolver::new(store);

    let resolved = resolver
        .resolve(vec![record("XOM", 42, "Exxon Mobil Corp")])
        .await;
    assert!(!resolved[0].is_resolved());

    let rows = resolver.store().rows.lock().await;
    assert_eq!(rows[0].ticker_id, Some(999));
    assert_eq!(rows[1].ticker_id, None);
}

#[tokio::test]
async fn dissimilar_company_names_are_rejected() {
    let store = MemoryStore::with(vec![row(
        "CAT",
        "BBG000BF0K17",
        "Caterpillar Inc",
        true,
        None,
    )]);
    let resolver = IdentityResolver::new(store);

    let resolved = resolver
        .resolve(vec![record("CAT", 7, "Zymeworks Biopharma")])
        .await;
    assert!(!resolved[0].is_resolved());
    assert_eq!(resolver.store().rows.lock().await[0].ticker_id, None);
    assert_eq!(*resolver.store().claims.lock().await, 0);
}

#[tokio::test]
async fn lost_claim_leaves_the_record_unresolved() {
    let store = MemoryStore {
        rows: Mutex::new(vec![row("XOM", "BBG000GZQ728", "Exxon Mobil Corp", true, None)]),
        lose_claims: true,
        ..Default::default()
    };
    let resolver = IdentityResolver::new(store);

    let resolved = resolver
        .resolve(vec![record("XOM", 42, "Exxon Mobil Corp")])
        .await;
    assert!(!resolved[0].is_resolved());
    assert_eq!(*resolver.store().claims.lock().await, 1);
}

#[tokio::test]
async fn failed_lookup_still_resolves_through_claims() {
    let store = MemoryStore {
        rows: Mutex::new(vec![row("MSFT", "BBG000BPH459", "Microsoft Corp", true, None)]),
        broken_lookup: true,
        ..Default::default()
    };
    let resolver = IdentityResolver::new(store);

    let resolved = resolver
        .resolve(vec![
            record("MSFT", 1, "Microsoft Corporation"),
            record("ZZZZ", 2, "Nothing Ltd"),
        ])
        .await;
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].composite_figi.as_deref(), Some("BBG000BPH459"));
    assert!(!resolved[1].is_resolved());
}

#[tokio::test]
async fn symbol_mismatch_on_a_known_id_falls_back_to_a_claim() {
    // id 5 used to trade as FB
    let store = MemoryStore::with(vec![
        row("FB", "BBG000MM2P62", "Meta Platforms Inc", true, Some(5)),
        row("META", "BBG000MM2P62", "Meta Platforms Inc", true, None),
    ]);
    let resolver = IdentityResolver::new(store);

    let resolved = resolver
        .resolve(vec![record("META", 5, "Meta Platforms, Inc.")])
        .await;
    assert_eq!(resolved[0].composite_figi.as_deref(), Some("BBG000MM2P62"));
    assert_eq!(resolver.store().rows.lock().await[1].ticker_id, Some(5));
}

#[tokio::test]
async fn missing_company_names_are_never_claimed() {
    let store = MemoryStore::with(vec![
        row("ABC", "BBG000ABC000", "", true, None),
        row("DEF", "BBG000DEF000", "Def Holdings", true, None),
    ]);
    let resolver = IdentityResolver::new(store);

    let resolved = resolver
        .resolve(vec![record("ABC", 1, ""), record("DEF", 2, "")])
        .await;
    assert!(resolved.iter().all(|r| !r.is_resolved()));
    assert_eq!(*resolver.store().claims.lock().await, 0);
}
