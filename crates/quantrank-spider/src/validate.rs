use crate::error::{Error, Result};
use crate::record::MetricRecord;
use tracing::{error, info};

type Rating = (&'static str, fn(&MetricRecord) -> f32);

/// Fail when any rating sums below one across all records, which means the session was served
/// empty grades.
pub fn ratings(records: &[MetricRecord]) -> Result<()> {
    info!("validating ratings of {} records", records.len());

    // ratings a healthy session always returns for some tickers
    let checks: [Rating; 6] = [
        ("quant_rating", |r| r.quant_rating),
        ("growth_category", |r| r.growth_category),
        ("eps_revisions_category", |r| r.eps_revisions_category),
        ("momentum_category", |r| r.momentum_category),
        ("profitability_category", |r| r.profitability_category),
        ("value_category", |r| r.value_category),
    ];
    for (field, get) in checks {
        let sum: f32 = records.iter().map(get).sum();
        if sum < 1.0 {
            error!("{field} is 0 for all records");
            return Err(Error::DegradedRatings { field });
        }
    }
    Ok(())
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn rated() -> MetricRecord {
        MetricRecord {
            quant_rating: 3.5,
            growth_category: 2.0,
            eps_revisions_category: 4.0,
            momentum_category: 1.0,
            profitability_category: 6.0,
            value_category: 9.0,
            ..Default::default()
        }
    }

    #[test]
    fn healthy_ratings_pass() {
        assert!(ratings(&[rated(), MetricRecord::default()]).is_ok());
    }

    #[test]
    fn empty_grades_are_degraded() {
        let records = vec![
            MetricRecord {
                momentum_category: 0.0,
                ..rated()
            };
            3
        ];
        assert!(matches!(
            ratings(&records),
            Err(Error::DegradedRatings {
                field: "momentum_category"
            })
        ));
    }

    #[test]
    fn no_records_is_degraded() {
        assert!(matches!(
            ratings(&[]),
            Err(Error::DegradedRatings {
                field: "quant_rating"
            })
        ));
    }
}
