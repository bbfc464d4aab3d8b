use super::payload::Attributes;
use crate::error::Result;
use crate::record::MetricRecord;
use std::collections::HashMap;

/// Which attribute of a metric entry carries its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Value,
    Grade,
}

impl Source {
    pub fn key(self) -> &'static str {
        match self {
            Source::Value => "value",
            Source::Grade => "grade",
        }
    }
}

/// Typed accessors for the record member a metric lands in.
#[derive(Clone, Copy)]
pub enum Slot {
    F64 {
        get: fn(&MetricRecord) -> f64,
        set: fn(&mut MetricRecord, f64),
    },
    F32 {
        get: fn(&MetricRecord) -> f32,
        set: fn(&mut MetricRecord, f32),
    },
    I64 {
        get: fn(&MetricRecord) -> i64,
        set: fn(&mut MetricRecord, i64),
    },
}

/// One row of the field-assignment table: source metric name, output column, source
/// attribute and target slot.
#[derive(Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub column: &'static str,
    pub source: Source,
    pub slot: Slot,
}

impl std::fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRule")
            .field("field", &self.field)
            .field("column", &self.column)
            .field("source", &self.source)
            .finish()
    }
}

impl FieldRule {
    /// Assign the metric to `record` if the entry is meaningful.
    ///
    /// Returns `Ok(false)` when the entry is not meaningful (the record is untouched), and a
    /// `FieldCoercionFailure` when the value has the wrong shape (the record is untouched).
    pub fn apply(&self, attributes: &Attributes, record: &mut MetricRecord) -> Result<bool> {
        if !attributes.is_meaningful() {
            return Ok(false);
        }

        let value = attributes.get(self.source.key());
        match self.slot {
            Slot::F64 { set, .. } => set(record, value.as_f64(self.field)?),
            Slot::F32 { set, .. } => set(record, value.as_f32(self.field)?),
            Slot::I64 { set, .. } => set(record, value.as_i64(self.field)?),
        }
        record.reported.insert(self.field);

        Ok(true)
    }
}

/// Find the rule for a metric field name.
pub fn lookup(field: &str) -> Option<&'static FieldRule> {
    BY_FIELD.get(field).copied()
}

macro_rules! rule {
    ($field:literal => $member:ident, $column:literal, $kind:ident) => {
        rule!($field => $member, $column, $kind, Value)
    };
    ($field:literal => $member:ident, $column:literal, $kind:ident, $source:ident) => {
        FieldRule {
            field: $field,
            column: $column,
            source: Source::$source,
            slot: Slot::$kind {
                get: |r| r.$member,
                set: |r, v| r.$member = v,
            },
        }
    };
}

lazy_static::lazy_static! {
    /// Every metric the spider keeps, in output column order.
    pub static ref FIELDS: Vec<FieldRule> = vec![
        // ratings
        rule!("marketcap_display" => market_cap, "MarketCap", F64),
        rule!("quant_rating" => quant_rating, "QuantRating", F32),
        rule!("authors_rating" => authors_rating_pro, "AuthorsRatingPro", F32),
        rule!("sell_side_rating" => sell_side_rating, "SellSideRating", F32),

        // grades
        rule!("value_category" => value_category, "ValueCategory", F32, Grade),
        rule!("growth_category" => growth_category, "GrowthCategory", F32, Grade),
        rule!("profitability_category" => profitability_category, "ProfitabilityCategory", F32, Grade),
        rule!("momentum_category" => momentum_category, "MomentumCategory", F32, Grade),
        rule!("eps_revisions_category" => eps_revisions_category, "EpsRevisionsCategory", F32, Grade),

        // earnings
        rule!("earning_announce_date" => earning_announce_timestamp, "EarningAnnounceTimestamp", I64),
        rule!("eps_estimate_fy1" => eps_estimate_fy1, "EpsEstimateFy1", F64),
        rule!("revenue_estimate" => revenue_estimate, "RevenueEstimate", F64),
        rule!("eps_normalized_actual" => eps_normalized_actual, "EpsNormalizedActual", F32),
        rule!("eps_surprise" => eps_surprise, "EpsSurprise", F32),
        rule!("revenue_actual" => revenue_actual, "RevenueActual", F64),
        rule!("revenue_surprise" => revenue_surprise, "RevenueSurprise", F64),

        // valuation
        rule!("tev" => tev, "Tev", F64),
        rule!("pe_ratio" => pe_ratio, "PeRatio", F32),
        rule!("pe_nongaap_fy1" => pe_nongaap_fy1, "PeNonGaapFy1", F32),
        rule!("ps_ratio" => ps_ratio, "PsRatio", F32),
        rule!("ev_12m_sales_ratio" => ev_12m_sales_ratio, "Ev12mSalesRatio", F32),
        rule!("ev_ebitda" => ev_ebitda, "EvEbitda", F32),
        rule!("pb_ratio" => pb_ratio, "PbRatio", F32),
        rule!("price_cf_ratio" => price_cf_ratio, "PriceCfRatio", F32),

        // growth
        rule!("revenue_growth" => revenue_growth, "RevenueGrowth", F32),
        rule!("revenue_change_display" => revenue_change, "RevenueChange", F32),
        rule!("revenue_growth3" => revenue_growth3, "RevenueGrowth3", F32),
        rule!("ebitda_yoy" => ebitda_yoy, "EbitdaYoy", F32),
        rule!("ebitda_3y_cagr" => ebitda_3y_cagr, "Ebitda3yCagr", F32),
        rule!("net_income_3y_cagr" => net_income_3y_cagr, "NetIncome3yCagr", F32),
        rule!("diluted_eps_growth" => diluted_eps_growth, "DilutedEpsGrowth", F32),
        rule!("earnings_growth_3y_cagr" => earnings_growth_3y_cagr, "EarningsGrowth3yCagr", F32),
        rule!("tangible_book_value_3y_cagr" => tangible_book_value_3y_cagr, "TangibleBookValue3yCagr", F32),
        rule!("total_assets_3y_cagr" => total_assets_3y_cagr, "TotalAssets3yCagr", F32),

        // profitability
        rule!("total_revenue" => total_revenue, "TotalRevenue", F64),
        rule!("net_income" => net_income, "NetIncome", F64),
        rule!("cash_from_operations_as_reported" => cash_from_operations_as_reported, "CashFromOperationsAsReported", F64),
        rule!("gross_margin" => gross_margin, "GrossMargin", F32),
        rule!("ebit_margin" => ebit_margin, "EbitMargin", F32),
        rule!("ebitda_margin" => ebitda_margin, "EbitdaMargin", F32),
        rule!("net_margin" => net_margin, "NetMargin", F32),
        rule!("levered_fcf_margin" => levered_fcf_margin, "LeveredFcfMargin", F32),
        rule!("roe" => roe, "Roe", F32),
        rule!("return_on_avg_tot_assets" => return_on_avg_tot_assets, "ReturnOnAvgTotAssets", F32),
        rule!("return_on_total_capital" => return_on_total_capital, "ReturnOnTotalCapital", F32),
        rule!("assets_turnover" => assets_turnover, "AssetsTurnover", F32),
        rule!("net_inc_per_employee" => net_inc_per_employee, "NetIncPerEmployee", F64),
        rule!("capex_to_sales" => capex_to_sales, "CapexToSales", F32),

        // risk
        rule!("short_interest_percent_of_float" => short_interest_percent_of_float, "ShortInterestPercentOfFloat", F32),
        rule!("short_interest_coverage_ratio" => short_interest_coverage_ratio, "ShortInterestCoverageRatio", F32),
        rule!("beta24" => beta24, "Beta24", F32),
        rule!("altman_z_score" => altman_z_score, "AltmanZScore", F32),

        // ownership
        rule!("shares" => shares, "Shares", I64),
        rule!("float_percent" => float_percent, "FloatPercent", F32),
        rule!("insiders_shares" => insiders_shares, "InsidersShares", I64),
        rule!("insiders_share_percent" => insiders_share_percent, "InsidersSharePercent", F64),
        rule!("institutions_shares" => institutions_shares, "InstitutionsShares", I64),
        rule!("institutions_share_percent" => institutions_share_percent, "InstitutionsSharePercent", F64),

        // leverage
        rule!("total_debt" => total_debt, "TotalDebt", F64),
        rule!("debt_long_term" => debt_long_term, "DebtLongTerm", F64),
        rule!("total_cash" => total_cash, "TotalCash", F64),
        rule!("debt_fcf" => debt_fcf, "DebtFcf", F32),
        rule!("current_ratio" => current_ratio, "CurrentRatio", F32),
        rule!("quick_ratio" => quick_ratio, "QuickRatio", F32),
        rule!("interest_coverage_ratio" => interest_coverage_ratio, "InterestCoverageRatio", F32),
        rule!("debt_eq" => debt_eq, "DebtEq", F32),
        rule!("long_term_debt_per_capital" => long_term_debt_per_capital, "LongTermDebtPerCapital", F32),
    ];

    static ref BY_FIELD: HashMap<&'static str, &'static FieldRule> =
        FIELDS.iter().map(|rule| (rule.field, rule)).collect();
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn attrs(pairs: &[(&str, serde_json::Value)]) -> Attributes {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn table_has_unique_fields_and_columns() {
        let fields: HashSet<_> = FIELDS.iter().map(|r| r.field).collect();
        let columns: HashSet<_> = FIELDS.iter().map(|r| r.column).collect();
        assert_eq!(fields.len(), FIELDS.len());
        assert_eq!(columns.len(), FIELDS.len());
        assert_eq!(FIELDS.len(), 67);
    }

    #[test]
    fn grades_read_the_grade_attribute() {
        let rule = lookup("growth_category").unwrap();
        assert_eq!(rule.source, Source::Grade);

        let mut record = MetricRecord::default();
        let applied = rule
            .apply(
                &attrs(&[("grade", json!(2.0)), ("meaningful", json!(true))]),
                &mut record,
            )
            .unwrap();
        assert!(applied);
        assert_eq!(record.growth_category, 2.0);
        assert!(record.is_reported("growth_category"));
    }

    #[test]
    fn not_meaningful_never_changes_a_field() {
        for rule in FIELDS.iter() {
            let mut record = MetricRecord::default();
            let value = json!(7.0);
            let filled = attrs(&[(rule.source.key(), value.clone()), ("meaningful", json!(true))]);
            rule.apply(&filled, &mut record).unwrap();
            let before = record.clone();

            for noise in [
                attrs(&[(rule.source.key(), json!(1.0)), ("meaningful", json!(false))]),
                attrs(&[(rule.source.key(), json!(1.0))]),
                attrs(&[(rule.source.key(), json!(1.0)), ("meaningful", json!(null))]),
            ] {
                assert!(!rule.apply(&noise, &mut record).unwrap());
                assert_eq!(record, before, "{} changed", rule.field);
            }
        }
    }

    #[test]
    fn coercion_failure_leaves_the_field_unset() {
        let rule = lookup("shares").unwrap();
        let mut record = MetricRecord::default();
        let result = rule.apply(
            &attrs(&[("value", json!("1.2B")), ("meaningful", json!(true))]),
            &mut record,
        );
        assert!(result.is_err());
        assert_eq!(record.shares, 0);
        assert!(!record.is_reported("shares"));
    }

    #[test]
    fn integer_fields_truncate() {
        let rule = lookup("earning_announce_date").unwrap();
        let mut record = MetricRecord::default();
        rule.apply(
            &attrs(&[("value", json!(1714593600.0)), ("meaningful", json!(true))]),
            &mut record,
        )
        .unwrap();
        assert_eq!(record.earning_announce_timestamp, 1_714_593_600);

        match rule.slot {
            Slot::I64 { get, .. } => assert_eq!(get(&record), 1_714_593_600),
            _ => panic!("earning_announce_date should be an integer slot"),
        }
    }
}
