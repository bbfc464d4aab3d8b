use super::payload::MetricsResponse;
use crate::error::{Error, Result};
use crate::session::{SessionTransport, TransportRequest};
use std::time::Duration;
use tracing::{debug, error, trace};

/// Query paths of the metric groups, relative to the API base url; each ends with the
/// `filter[slugs]=` parameter the symbols are appended to.
pub static METRIC_GROUPS: &[(&str, &str)] = &[
    (
        "ratings",
        "/api/v3/metrics?filter[fields]=marketcap_display%2Cdividend_yield%2Cquant_rating%2Cauthors_rating%2Csell_side_rating&filter[slugs]=",
    ),
    (
        "grades",
        "/api/v3/ticker_metric_grades?filter[algos][]=etf&filter[algos][]=dividends&filter[algos][]=main_quant&filter[algos][]=reit&filter[algos][]=reit_dividend&filter[fields]=value_category%2Cgrowth_category%2Cprofitability_category%2Cmomentum_category%2Ceps_revisions_category&filter[slugs]=",
    ),
    (
        "earnings",
        "/api/v3/metrics?filter[fields]=earning_announce_date%2Ceps_estimate_fy1%2Crevenue_estimate%2Ceps_normalized_actual%2Ceps_surprise%2Crevenue_actual%2Crevenue_surprise&filter[slugs]=",
    ),
    (
        "dividend grades",
        "/api/v3/metrics?filter[fields]=div_growth_category%2Cdiv_safety_category%2Cdiv_yield_category%2Cdiv_consistency_category&filter[slugs]=",
    ),
    (
        "dividends",
        "/api/v3/metrics?filter[fields]=last_div_date%2Cdiv_pay_date%2Cdividend_yield%2Cdiv_yield_fwd%2Cdiv_yield_4y%2Cdiv_rate_ttm%2Cdiv_rate_fwd%2Cpayout_ratio%2Cpayout_ratio_4y%2Cdiv_grow_rate3%2Cdiv_grow_rate5%2Cdividend_growth&filter[slugs]=",
    ),
    (
        "eps revisions",
        "/api/v3/metrics?filter[fields]=eps_revisions_category&filter[slugs]=",
    ),
    (
        "valuation",
        "/api/v3/metrics?filter[fields]=marketcap_display%2Ctev%2Cpe_ratio%2Cpe_nongaap_fy1%2Cpeg_gaap%2Cpeg_nongaap_fy1%2Cps_ratio%2Cev_12m_sales_ratio%2Cev_ebitda%2Cpb_ratio%2Cprice_cf_ratio&filter[slugs]=",
    ),
    (
        "growth",
        "/api/v3/metrics?filter[fields]=revenue_growth%2Crevenue_change_display%2Crevenue_growth3%2Crevenue_growth5%2Cebitda_yoy%2Cebitda_change_display%2Cebitda_3y_cagr%2Cnet_income_3y_cagr%2Cdiluted_eps_growth%2Ceps_change_display%2Cearnings_growth_3y_cagr%2Ctangible_book_value_3y_cagr%2Ctotal_assets_3y_cagr%2Clevered_free_cash_flow_3y_cagr&filter[slugs]=",
    ),
    (
        "profitability",
        "/api/v3/metrics?filter[fields]=total_revenue%2Cnet_income%2Ccash_from_operations_as_reported%2Cgross_margin%2Cebit_margin%2Cebitda_margin%2Cnet_margin%2Clevered_fcf_margin%2Croe%2Creturn_on_avg_tot_assets%2Creturn_on_total_capital%2Cassets_turnover%2Cnet_inc_per_employee%2Ccapex_to_sales&filter[slugs]=",
    ),
    (
        "risk",
        "/api/v3/metrics?filter[fields]=short_interest_percent_of_float%2Clast_closing_shares_short%2Cshort_interest_coverage_ratio%2Cbeta24%2Cbeta60%2Caltman_z_score&filter[slugs]=",
    ),
    (
        "ownership",
        "/api/v3/metrics?filter[fields]=shares%2Cfloat_percent%2Cinsiders_shares%2Cinsiders_share_percent%2Cinstitutions_shares%2Cinstitutions_share_percent&filter[slugs]=",
    ),
    (
        "leverage",
        "/api/v3/metrics?filter[fields]=total_debt%2Cdebt_short_term%2Cdebt_long_term%2Ctotal_cash%2Cdebt_fcf%2Ccurrent_ratio%2Cquick_ratio%2Cinterest_coverage_ratio%2Cdebt_eq%2Clong_term_debt_per_capital&filter[slugs]=",
    ),
];

/// One metric endpoint, with the full url up to (and including) `filter[slugs]=`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricGroup {
    pub name: &'static str,
    pub url: String,
}

impl MetricGroup {
    /// Url for `symbols`, each percent-encoded and joined by an encoded comma.
    pub fn url_for(&self, symbols: &[String]) -> String {
        let slugs = symbols
            .iter()
            .map(|symbol| urlencoding::encode(symbol))
            .collect::<Vec<_>>()
            .join("%2C");
        format!("{}{slugs}", self.url)
    }
}

/// Fetches metric groups for a page of symbols, pacing every call.
#[derive(Clone, Debug)]
pub struct MetricsFetcher {
    delay: Duration,
}

impl MetricsFetcher {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn fetch_group<T: SessionTransport>(
        &self,
        transport: &mut T,
        group: &MetricGroup,
        symbols: &[String],
    ) -> Result<MetricsResponse> {
        tokio::time::sleep(self.delay).await;

        let url = group.url_for(symbols);
        trace!("fetching {} metrics for {} symbols", group.name, symbols.len());
        let response = transport.send(TransportRequest::get(&url)).await?;

        if response.status != 200 {
            error!(
                "{} metrics returned status {}",
                group.name, response.status
            );
            return Err(Error::InvalidResponseStatus {
                url,
                status: response.status,
            });
        }

        let payload: MetricsResponse = serde_json::from_slice(&response.body).map_err(|err| {
            error!("failed to decode {} metrics, error({err})", group.name);
            Error::MalformedPayload {
                url: url.clone(),
                reason: err.to_string(),
            }
        })?;

        debug!(
            "{} metrics: {} entries, {} side-loaded",
            group.name,
            payload.data.len(),
            payload.included.len()
        );
        Ok(payload)
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
