use anyhow::anyhow;
use chrono::NaiveDate;
use deadpool_postgres::{ManagerConfig, Pool, RecyclingMethod};
use quantrank_spider::acquire::Acquisition;
use quantrank_spider::config::Config;
use quantrank_spider::identity::{IdentityResolver, PgIdentityStore};
use quantrank_spider::record::ResolvedRecord;
use quantrank_spider::session::HttpSession;
use quantrank_spider::{sink, validate};
use std::path::Path;
use tracing::{debug, error, info, trace};

#[derive(Debug)]
pub(crate) struct ImportArgs {
    pub test: bool,
    pub date: Option<NaiveDate>,
    pub output: Option<String>,
    pub limit: usize,
}

/// Acquire, validate, resolve & persist one day of ratings.
pub(crate) async fn run(args: ImportArgs, tui: bool) -> anyhow::Result<()> {
    let time = std::time::Instant::now();
    let config = Config::from_env()?;
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    info!("importing ratings for {date}");

    // 1. acquisition: screener pages & metric groups, over one session
    let session = HttpSession::new(
        &config.state_file,
        config.user_agent.clone(),
        config.request_timeout,
    );
    let mut records = Acquisition::new(&config, date)
        .with_tui(tui)
        .run(session)
        .await?;

    // 2. sanity check before anything is written
    validate::ratings(&records)?;
    let acquired = records.len();
    if args.limit > 0 && args.limit < records.len() {
        debug!("limiting {} records to {}", records.len(), args.limit);
        records.truncate(args.limit);
    }

    // 3. identity resolution & the ratings table
    let (resolved, upserted) = if args.test {
        info!("test run; skipping identity resolution and the database");
        let resolved: Vec<ResolvedRecord> =
            records.into_iter().map(ResolvedRecord::unresolved).collect();
        (resolved, 0)
    } else {
        let pool = connect(&config)?;
        let resolver =
            IdentityResolver::new(PgIdentityStore::new(pool.clone(), &config.identity_table));
        let resolved = resolver.resolve(records).await;
        let upserted = sink::upsert(&pool, &config.ratings_table, &resolved).await?;
        (resolved, upserted)
    };

    // 4. columnar snapshot
    let dir = args.output.unwrap_or(config.output_dir);
    let path = Path::new(&dir).join(sink::file_name(date));
    sink::write_parquet(&path, &resolved)?;

    info!(
        "import finished: {acquired} acquired, {} resolved, {upserted} upserted, snapshot {}, time elapsed: {:?}",
        resolved.iter().filter(|r| r.is_resolved()).count(),
        path.display(),
        time.elapsed()
    );
    Ok(())
}

fn connect(config: &Config) -> anyhow::Result<Pool> {
    trace!("creating postgres connection pool config");
    let mut pg_config = deadpool_postgres::Config::new();
    pg_config.url = Some(
        config
            .database_url
            .clone()
            .ok_or_else(|| anyhow!("DATABASE_URL must be set unless running with --test"))?,
    );
    pg_config.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    trace!("creating connection pool");
    let pool = pg_config
        .create_pool(
            Some(deadpool_postgres::Runtime::Tokio1),
            tokio_postgres::NoTls,
        )
        .map_err(|err| {
            error!("failed to create connection pool, error({err})");
            err
        })?;
    debug!("connection pool established");
    Ok(pool)
}
