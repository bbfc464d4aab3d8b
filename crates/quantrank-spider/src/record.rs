use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Canonical symbol form: upper-cased, with `.` class separators written as `/`.
///
/// ```rust
/// use quantrank_spider::record::format_symbol;
///
/// assert_eq!(format_symbol("brk.b"), "BRK/B");
/// assert_eq!(format_symbol(&format_symbol("brk.b")), "BRK/B");
/// ```
pub fn format_symbol(symbol: &str) -> String {
    symbol.to_uppercase().replace('.', "/")
}

/// A ticker as described by the side-loaded `ticker` entries of a metrics payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ticker {
    pub ticker_id: i32,
    pub symbol: String,
    pub company_name: String,
    pub exchange: String,
    pub equity_type: String,
    pub is_bdc: bool,
    pub is_defunct: bool,
    pub is_reit: bool,
    pub followers_count: i32,
}

/// One ticker's ratings & fundamentals for a single run.
///
/// Unreported metrics stay at zero; `reported` records which metric fields were actually
/// assigned so a zero can be told apart from a missing value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricRecord {
    pub date: NaiveDate,
    pub ticker_id: i32,
    pub ticker: String,
    pub company_name: String,
    pub exchange: String,
    pub equity_type: String,
    pub is_bdc: bool,
    pub is_defunct: bool,
    pub is_reit: bool,
    pub followers_count: i32,

    // ratings
    pub market_cap: f64,
    pub quant_rating: f32,
    pub authors_rating_pro: f32,
    pub sell_side_rating: f32,

    // grades
    pub value_category: f32,
    pub growth_category: f32,
    pub profitability_category: f32,
    pub momentum_category: f32,
    pub eps_revisions_category: f32,

    // earnings
    pub earning_announce_timestamp: i64,
    pub eps_estimate_fy1: f64,
    pub revenue_estimate: f64,
    pub eps_normalized_actual: f32,
    pub eps_surprise: f32,
    pub revenue_actual: f64,
    pub revenue_surprise: f64,

    // valuation
    pub tev: f64,
    pub pe_ratio: f32,
    pub pe_nongaap_fy1: f32,
    pub ps_ratio: f32,
    pub ev_12m_sales_ratio: f32,
    pub ev_ebitda: f32,
    pub pb_ratio: f32,
    pub price_cf_ratio: f32,

    // growth
    pub revenue_growth: f32,
    pub revenue_change: f32,
    pub revenue_growth3: f32,
    pub ebitda_yoy: f32,
    pub ebitda_3y_cagr: f32,
    pub net_income_3y_cagr: f32,
    pub diluted_eps_growth: f32,
    pub earnings_growth_3y_cagr: f32,
    pub tangible_book_value_3y_cagr: f32,
    pub total_assets_3y_cagr: f32,

    // profitability
    pub total_revenue: f64,
    pub net_income: f64,
    pub cash_from_operations_as_reported: f64,
    pub gross_margin: f32,
    pub ebit_margin: f32,
    pub ebitda_margin: f32,
    pub net_margin: f32,
    pub levered_fcf_margin: f32,
    pub roe: f32,
    pub return_on_avg_tot_assets: f32,
    pub return_on_total_capital: f32,
    pub assets_turnover: f32,
    pub net_inc_per_employee: f64,
    pub capex_to_sales: f32,

    // risk
    pub short_interest_percent_of_float: f32,
    pub short_interest_coverage_ratio: f32,
    pub beta24: f32,
    pub altman_z_score: f32,

    // ownership
    pub shares: i64,
    pub float_percent: f32,
    pub insiders_shares: i64,
    pub insiders_share_percent: f64,
    pub institutions_shares: i64,
    pub institutions_share_percent: f64,

    // leverage
    pub total_debt: f64,
    pub debt_long_term: f64,
    pub total_cash: f64,
    pub debt_fcf: f32,
    pub current_ratio: f32,
    pub quick_ratio: f32,
    pub interest_coverage_ratio: f32,
    pub debt_eq: f32,
    pub long_term_debt_per_capital: f32,

    pub reported: BTreeSet<&'static str>,
}

impl MetricRecord {
    /// Seed an empty record for `ticker` on the run `date`.
    pub fn new(ticker: &Ticker, date: NaiveDate) -> Self {
        Self {
            date,
            ticker_id: ticker.ticker_id,
            ticker: ticker.symbol.clone(),
            company_name: ticker.company_name.clone(),
            exchange: ticker.exchange.clone(),
            equity_type: ticker.equity_type.clone(),
            is_bdc: ticker.is_bdc,
            is_defunct: ticker.is_defunct,
            is_reit: ticker.is_reit,
            followers_count: ticker.followers_count,
            ..Default::default()
        }
    }

    /// Whether the metric sourced from `field` was reported with a meaningful value.
    pub fn is_reported(&self, field: &str) -> bool {
        self.reported.contains(field)
    }

    /// Apply the final symbol formatting.
    pub fn finalize(mut self) -> Self {
        self.ticker = format_symbol(&self.ticker);
        self
    }
}

/// A [`MetricRecord`] together with its internal composite identifier, once linked.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRecord {
    pub record: MetricRecord,
    pub composite_figi: Option<String>,
}

impl ResolvedRecord {
    pub fn unresolved(record: MetricRecord) -> Self {
        Self {
            record,
            composite_figi: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.composite_figi.is_some()
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[test]
fn symbol_formatting_is_idempotent() {
    for symbol in ["aapl", "brk.b", "BF/B", "rds.a.x", ""] {
        let once = format_symbol(symbol);
        assert_eq!(format_symbol(&once), once);
        assert!(!once.contains('.'));
    }
    assert_eq!(format_symbol("brk.b"), "BRK/B");
}

#[test]
fn new_record_is_seeded_from_the_ticker() {
    let ticker = Ticker {
        ticker_id: 146,
        symbol: "aapl".into(),
        company_name: "Apple Inc.".into(),
        exchange: "NASDAQ".into(),
        equity_type: "stocks".into(),
        followers_count: 3_000_000,
        ..Default::default()
    };
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let record = MetricRecord::new(&ticker, date).finalize();

    assert_eq!(record.ticker, "AAPL");
    assert_eq!(record.ticker_id, 146);
    assert_eq!(record.date, date);
    assert_eq!(record.quant_rating, 0.0);
    assert!(record.reported.is_empty());
}
