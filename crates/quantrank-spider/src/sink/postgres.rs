use crate::error::Result;
use crate::http::*;
use crate::record::ResolvedRecord;
use tracing::{debug, error, info, trace};

/// Upsert one ratings row per record, keyed by ticker and event date.
///
/// A failing row is logged and skipped; the count of rows written is returned.
pub async fn upsert(pool: &PgPool, table: &str, records: &[ResolvedRecord]) -> Result<usize> {
    let time = std::time::Instant::now();
    let pg_client = pool.get().await?;
    let query = pg_client
        .prepare(&crate::sql::upsert_rating(table))
        .await
        .map_err(|err| {
            error!("failed to prepare {table} upsert, error({err})");
            err
        })?;
    debug!("upserting {} records into {table}", records.len());

    let mut written = 0;
    for resolved in records {
        let record = &resolved.record;
        let market_cap_mil = record.market_cap / 1e6;
        let result = pg_client
            .execute(
                &query,
                &[
                    &record.ticker,
                    &resolved.composite_figi,
                    &record.date,
                    &market_cap_mil,
                    &record.quant_rating,
                    &record.growth_category,
                    &record.profitability_category,
                    &record.value_category,
                    &record.eps_revisions_category,
                    &record.authors_rating_pro,
                    &record.sell_side_rating,
                ],
            )
            .await;

        match result {
            Ok(_) => {
                trace!("{} upserted", record.ticker);
                written += 1;
            }
            Err(err) => error!("failed to upsert {}, error({err})", record.ticker),
        }
    }

    info!(
        "{written} of {} records saved to {table}, {}",
        records.len(),
        crate::time_elapsed(time)
    );
    Ok(written)
}
