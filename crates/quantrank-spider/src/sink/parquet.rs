use crate::error::{Error, Result};
use crate::metrics::fields::{Slot, FIELDS};
use crate::record::ResolvedRecord;
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, error, info};

/// Snapshot file name for a run date, e.g. `sa-20240501.parquet`.
pub fn file_name(date: NaiveDate) -> String {
    format!("sa-{}.parquet", date.format("%Y%m%d"))
}

/// Write the run's records to `path` as gzip-compressed Parquet, one row per record.
pub fn write_parquet(path: &Path, records: &[ResolvedRecord]) -> Result<usize> {
    let time = std::time::Instant::now();
    let mut df = to_dataframe(records).map_err(|err| {
        error!("failed to build snapshot dataframe, error({err})");
        Error::SinkWriteFailure(err.to_string())
    })?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = std::fs::File::create(path)?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Gzip(None))
        .finish(&mut df)
        .map_err(|err| {
            error!("failed to write {}, error({err})", path.display());
            Error::SinkWriteFailure(err.to_string())
        })?;

    info!(
        "{} rows written to {}, {}",
        df.height(),
        path.display(),
        crate::time_elapsed(time)
    );
    Ok(df.height())
}

/// Identity columns followed by every metric column, in field-table order.
pub fn to_dataframe(records: &[ResolvedRecord]) -> PolarsResult<DataFrame> {
    let mut columns = vec![
        text("Date", records, |r| r.record.date.format("%Y-%m-%d").to_string())?,
        Column::new(
            "SeekingAlphaTickerId".into(),
            records.iter().map(|r| r.record.ticker_id).collect::<Vec<i32>>(),
        ),
        text("Ticker", records, |r| r.record.ticker.clone())?,
        text("CompositeFigi", records, |r| {
            r.composite_figi.clone().unwrap_or_default()
        })?,
        text("CompanyName", records, |r| r.record.company_name.clone())?,
        text("Exchange", records, |r| r.record.exchange.clone())?,
        text("Type", records, |r| r.record.equity_type.clone())?,
        Column::new(
            "FollowersCount".into(),
            records
                .iter()
                .map(|r| r.record.followers_count)
                .collect::<Vec<i32>>(),
        ),
    ];

    for rule in FIELDS.iter() {
        let name = rule.column;
        let column = match rule.slot {
            Slot::F64 { get, .. } => Column::new(
                name.into(),
                records.iter().map(|r| get(&r.record)).collect::<Vec<f64>>(),
            ),
            Slot::F32 { get, .. } => Column::new(
                name.into(),
                records.iter().map(|r| get(&r.record)).collect::<Vec<f32>>(),
            ),
            Slot::I64 { get, .. } => Column::new(
                name.into(),
                records.iter().map(|r| get(&r.record)).collect::<Vec<i64>>(),
            ),
        };
        columns.push(column);
    }

    debug!("snapshot frame: {} columns", columns.len());
    DataFrame::new(columns)
}

/// Dictionary-encoded string column.
fn text(
    name: &str,
    records: &[ResolvedRecord],
    value: impl Fn(&ResolvedRecord) -> String,
) -> PolarsResult<Column> {
    Column::new(name.into(), records.iter().map(value).collect::<Vec<String>>())
        .cast(&DataType::Categorical(None, CategoricalOrdering::Physical))
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
