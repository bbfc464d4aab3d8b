//! Statements against the identity and ratings tables.
//!
//! Table names come from configuration, so statements are rendered per table rather than kept
//! as static strings.

//////////////////////////////////////////////////////////////////
// identity
//////////////////////////////////////////////////////////////////

/// Active rows already carrying both an external ticker id and a composite figi.
pub(crate) fn select_linked(table: &str) -> String {
    format!(
        "
    SELECT ticker, seeking_alpha_id, composite_figi
    FROM {table}
    WHERE active = 't' AND seeking_alpha_id IS NOT NULL AND composite_figi IS NOT NULL
"
    )
}

/// Active, unlinked rows for a symbol that could take an external ticker id.
pub(crate) fn select_candidate(table: &str) -> String {
    format!(
        "
    SELECT name, composite_figi, ticker
    FROM {table}
    WHERE active = 't' AND composite_figi IS NOT NULL AND seeking_alpha_id IS NULL AND ticker = $1
"
    )
}

/// The claim: links the external id only while the row is still unlinked.
pub(crate) fn claim_link(table: &str) -> String {
    format!(
        "
    UPDATE {table} SET seeking_alpha_id = $1
    WHERE active = 't' AND seeking_alpha_id IS NULL AND composite_figi = $2 AND ticker = $3
"
    )
}

//////////////////////////////////////////////////////////////////
// ratings
//////////////////////////////////////////////////////////////////

/// Daily ratings, keyed by ticker and event date.
pub(crate) fn upsert_rating(table: &str) -> String {
    format!(
        "
    INSERT INTO {table} (
        ticker, composite_figi, event_date, market_cap_mil, quant_rating, growth_grade,
        profitability_grade, value_grade, eps_revisions_grade, authors_rating_pro, sell_side_rating
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (ticker, event_date) DO UPDATE SET
        composite_figi = EXCLUDED.composite_figi,
        market_cap_mil = EXCLUDED.market_cap_mil,
        quant_rating = EXCLUDED.quant_rating,
        growth_grade = EXCLUDED.growth_grade,
        profitability_grade = EXCLUDED.profitability_grade,
        value_grade = EXCLUDED.value_grade,
        eps_revisions_grade = EXCLUDED.eps_revisions_grade,
        authors_rating_pro = EXCLUDED.authors_rating_pro,
        sell_side_rating = EXCLUDED.sell_side_rating
"
    )
}

#[test]
fn statements_target_the_configured_table() {
    assert!(select_linked("assets").contains("FROM assets"));
    assert!(claim_link("assets_v2").contains("UPDATE assets_v2 SET"));
    assert!(upsert_rating("seeking_alpha").contains("ON CONFLICT (ticker, event_date)"));
    assert_eq!(upsert_rating("t").matches("EXCLUDED.").count(), 9);
}
