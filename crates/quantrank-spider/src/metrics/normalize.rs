use super::fields;
use super::payload::{Attributes, AttrValue, MetaItem, MetricItem, MetricsResponse};
use crate::error::{Error, Result};
use crate::record::{MetricRecord, Ticker};
use chrono::NaiveDate;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Folds metric payloads from every page & group into one record per ticker.
#[derive(Debug)]
pub struct RecordNormalizer {
    date: NaiveDate,
    records: HashMap<i32, MetricRecord>,
}

/// Side-loaded lookups of a single payload.
#[derive(Debug, Default)]
struct SideTables {
    tickers: HashMap<i32, Ticker>,
    fields: HashMap<String, String>,
}

impl RecordNormalizer {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            records: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Merge one metrics payload, returning how many fields were assigned.
    ///
    /// Problems with single entries are logged and the entry skipped; they never fail the
    /// payload.
    pub fn merge(&mut self, payload: &MetricsResponse) -> usize {
        let side = SideTables::from_included(&payload.included);

        let mut assigned = 0;
        for item in &payload.data {
            match self.merge_item(item, &side) {
                Ok(true) => assigned += 1,
                Ok(false) => {}
                Err(err) => warn!("skipping metric entry {}, error({err})", item.id),
            }
        }

        trace!(
            "merged {} of {} metric entries, {} records",
            assigned,
            payload.data.len(),
            self.records.len()
        );
        assigned
    }

    fn merge_item(&mut self, item: &MetricItem, side: &SideTables) -> Result<bool> {
        if item.kind != "metric" && item.kind != "ticker_metric_grade" {
            warn!("unexpected metric entry type {}", item.kind);
            return Ok(false);
        }

        let ticker_id = item.relationships.ticker_id().ok_or_else(|| {
            Error::UnresolvedRelationship(format!("entry {} has no ticker", item.id))
        })?;
        let type_id = item.relationships.metric_type_id().ok_or_else(|| {
            Error::UnresolvedRelationship(format!("entry {} has no metric type", item.id))
        })?;
        let field = side.fields.get(type_id).ok_or_else(|| {
            Error::UnresolvedRelationship(format!("metric type {type_id} is not side-loaded"))
        })?;

        let Some(rule) = fields::lookup(field) else {
            trace!("ignoring metric {field}");
            return Ok(false);
        };

        let ticker_id: i32 = ticker_id.parse().map_err(|_| {
            Error::UnresolvedRelationship(format!("ticker id {ticker_id} is not an integer"))
        })?;
        let record = match self.records.entry(ticker_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let ticker = side.tickers.get(&ticker_id).ok_or_else(|| {
                    Error::UnresolvedRelationship(format!("ticker {ticker_id} is not side-loaded"))
                })?;
                entry.insert(MetricRecord::new(ticker, self.date))
            }
        };

        let applied = rule.apply(&item.attributes, record)?;
        if !applied {
            debug!("{field} of {} is not meaningful", record.ticker);
        }
        Ok(applied)
    }

    /// Consolidated records, symbols formatted, ordered by symbol.
    pub fn finish(self) -> Vec<MetricRecord> {
        let mut records: Vec<MetricRecord> = self
            .records
            .into_values()
            .map(MetricRecord::finalize)
            .collect();
        records.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        records
    }
}

impl SideTables {
    fn from_included(included: &[MetaItem]) -> Self {
        let mut side = Self::default();
        for meta in included {
            match meta.kind.as_str() {
                "ticker" => match parse_ticker(meta) {
                    Ok(ticker) => {
                        side.tickers.insert(ticker.ticker_id, ticker);
                    }
                    Err(err) => warn!("skipping ticker {}, error({err})", meta.id),
                },
                "metric_type" => match meta.attributes.get("field").as_str("field") {
                    Ok(field) => {
                        side.fields.insert(meta.id.clone(), field.to_string());
                    }
                    Err(err) => warn!("skipping metric type {}, error({err})", meta.id),
                },
                other => debug!("ignoring side-loaded {other} {}", meta.id),
            }
        }
        side
    }
}

fn parse_ticker(meta: &MetaItem) -> Result<Ticker> {
    let attributes = &meta.attributes;
    let ticker_id: i32 = meta.id.parse().map_err(|_| {
        Error::UnresolvedRelationship(format!("ticker id {} is not an integer", meta.id))
    })?;

    Ok(Ticker {
        ticker_id,
        symbol: attributes.get("slug").as_str("slug")?.to_string(),
        company_name: optional_str(attributes, "companyName"),
        exchange: optional_str(attributes, "exchange"),
        equity_type: optional_str(attributes, "equityType"),
        is_bdc: optional_bool(attributes, "isBdc"),
        is_defunct: optional_bool(attributes, "isDefunct"),
        is_reit: optional_bool(attributes, "isReit"),
        followers_count: followers_count(attributes, ticker_id),
    })
}

/// Follower count of a ticker; a value that does not fit is logged and left at 0.
fn followers_count(attributes: &Attributes, ticker_id: i32) -> i32 {
    let count = match attributes.get("followersCount") {
        AttrValue::Absent => return 0,
        value => value.as_i64("followersCount"),
    };
    match count.map(i32::try_from) {
        Ok(Ok(count)) => count,
        Ok(Err(err)) => {
            warn!("followersCount of ticker {ticker_id} is out of range, error({err})");
            0
        }
        Err(err) => {
            warn!("followersCount of ticker {ticker_id} is unusable, error({err})");
            0
        }
    }
}

fn optional_str(attributes: &Attributes, key: &str) -> String {
    attributes
        .get(key)
        .as_str(key)
        .map(str::to_string)
        .unwrap_or_default()
}

fn optional_bool(attributes: &Attributes, key: &str) -> bool {
    attributes.get(key).as_bool(key).unwrap_or(false)
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn payload(b_meaningful: bool) -> MetricsResponse {
        serde_json::from_value(json!({
            "data": [
                {
                    "id": "12_A",
                    "type": "metric",
                    "attributes": { "value": 3.5, "meaningful": true },
                    "relationships": {
                        "ticker": { "data": { "id": "12", "type": "ticker" } },
                        "metric_type": { "data": { "id": "A", "type": "metric_type" } }
                    }
                },
                {
                    "id": "12_B",
                    "type": "ticker_metric_grade",
                    "attributes": { "grade": 2.0, "meaningful": b_meaningful },
                    "relationships": {
                        "ticker": { "data": { "id": "12", "type": "ticker" } },
                        "metric_type": { "data": { "id": "B", "type": "metric_type" } }
                    }
                }
            ],
            "included": [
                {
                    "id": "12",
                    "type": "ticker",
                    "attributes": {
                        "slug": "aapl",
                        "companyName": "Apple Inc.",
                        "exchange": "NASDAQ",
                        "equityType": "stocks",
                        "followersCount": 3200000
                    }
                },
                { "id": "A", "type": "metric_type", "attributes": { "field": "quant_rating" } },
                { "id": "B", "type": "metric_type", "attributes": { "field": "growth_category" } },
                { "id": "x", "type": "sector", "attributes": {} }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn rating_and_grade_fold_into_one_record() {
        let mut normalizer = RecordNormalizer::new(date());
        assert_eq!(normalizer.merge(&payload(true)), 2);

        let records = normalizer.finish();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.ticker, "AAPL");
        assert_eq!(record.company_name, "Apple Inc.");
        assert_eq!(record.followers_count, 3_200_000);
        assert_eq!(record.quant_rating, 3.5);
        assert_eq!(record.growth_category, 2.0);
        assert_eq!(record.date, date());
    }

    #[test]
    fn not_meaningful_grade_is_left_unset() {
        let mut normalizer = RecordNormalizer::new(date());
        assert_eq!(normalizer.merge(&payload(false)), 1);

        let records = normalizer.finish();
        assert_eq!(records[0].quant_rating, 3.5);
        assert_eq!(records[0].growth_category, 0.0);
        assert!(!records[0].is_reported("growth_category"));
    }

    #[test]
    fn later_not_meaningful_signal_keeps_the_value() {
        let mut normalizer = RecordNormalizer::new(date());
        normalizer.merge(&payload(true));
        normalizer.merge(&payload(false));

        let records = normalizer.finish();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].growth_category, 2.0);
    }

    #[test]
    fn unresolvable_entries_are_skipped() {
        let payload: MetricsResponse = serde_json::from_value(json!({
            "data": [
                {
                    "id": "orphan",
                    "type": "metric",
                    "attributes": { "value": 1.0, "meaningful": true },
                    "relationships": {
                        "ticker": { "data": { "id": "99", "type": "ticker" } },
                        "metric_type": { "data": { "id": "A", "type": "metric_type" } }
                    }
                },
                {
                    "id": "untyped",
                    "type": "metric",
                    "attributes": { "value": 1.0, "meaningful": true },
                    "relationships": { "ticker": { "data": { "id": "99", "type": "ticker" } } }
                },
                { "id": "odd", "type": "something_else" }
            ],
            "included": [
                { "id": "A", "type": "metric_type", "attributes": { "field": "quant_rating" } },
                { "id": "NaN", "type": "ticker", "attributes": { "slug": "bad" } }
            ]
        }))
        .unwrap();

        let mut normalizer = RecordNormalizer::new(date());
        assert_eq!(normalizer.merge(&payload), 0);
        assert!(normalizer.is_empty());
    }

    #[test]
    fn records_are_ordered_by_symbol() {
        let data: Vec<_> = [2, 1]
            .iter()
            .map(|id| {
                json!({
                    "id": format!("{id}_A"),
                    "type": "metric",
                    "attributes": { "value": 4.0, "meaningful": true },
                    "relationships": {
                        "ticker": { "data": { "id": id.to_string() } },
                        "metric_type": { "data": { "id": "A" } }
                    }
                })
            })
            .collect();
        let payload: MetricsResponse = serde_json::from_value(json!({
            "data": data,
            "included": [
                { "id": "1", "type": "ticker", "attributes": { "slug": "msft" } },
                { "id": "2", "type": "ticker", "attributes": { "slug": "brk.b" } },
                { "id": "A", "type": "metric_type", "attributes": { "field": "quant_rating" } }
            ]
        }))
        .unwrap();

        let mut normalizer = RecordNormalizer::new(date());
        normalizer.merge(&payload);
        let symbols: Vec<_> = normalizer.finish().into_iter().map(|r| r.ticker).collect();
        assert_eq!(symbols, vec!["BRK/B", "MSFT"]);
    }

    fn single_rating(followers: serde_json::Value) -> MetricsResponse {
        serde_json::from_value(json!({
            "data": [{
                "id": "12_A",
                "type": "metric",
                "attributes": { "value": 3.5, "meaningful": true },
                "relationships": {
                    "ticker": { "data": { "id": "12", "type": "ticker" } },
                    "metric_type": { "data": { "id": "A", "type": "metric_type" } }
                }
            }],
            "included": [
                {
                    "id": "12",
                    "type": "ticker",
                    "attributes": { "slug": "aapl", "followersCount": followers }
                },
                { "id": "A", "type": "metric_type", "attributes": { "field": "quant_rating" } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn malformed_followers_count_keeps_the_ticker() {
        let mut normalizer = RecordNormalizer::new(date());
        assert_eq!(normalizer.merge(&single_rating(json!("3.2M"))), 1);

        let records = normalizer.finish();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ticker, "AAPL");
        assert_eq!(records[0].quant_rating, 3.5);
        assert_eq!(records[0].followers_count, 0);
    }

    #[test]
    fn oversized_followers_count_is_dropped() {
        let mut normalizer = RecordNormalizer::new(date());
        assert_eq!(normalizer.merge(&single_rating(json!(5_000_000_000i64))), 1);

        let records = normalizer.finish();
        assert_eq!(records[0].followers_count, 0);
    }
}
