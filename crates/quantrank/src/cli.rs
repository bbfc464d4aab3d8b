use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing.
    ///
    /// Without a level, progress bars are shown instead of logs.
    #[arg(short, long, global = true)]
    pub trace: Option<TraceLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the day's ratings & fundamentals, link them to composite figis, and persist them.
    Import {
        /// Skip identity resolution and the database; only the Parquet snapshot is written.
        #[arg(long)]
        test: bool,

        /// Run date (YYYY-MM-DD); defaults to today.
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Directory for the Parquet snapshot; defaults to `OUTPUT_DIR`.
        #[arg(short, long)]
        output: Option<String>,

        /// Persist only the first N records, ordered by symbol (0 keeps all).
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
#[clap(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    DEBUG,
    ERROR,
    INFO,
    TRACE,
    WARN,
}

#[test]
fn import_arguments_parse() {
    let cli = Cli::parse_from([
        "quantrank", "-t", "DEBUG", "import", "--test", "--date", "2024-05-01", "-l", "10",
    ]);
    assert_eq!(cli.trace, Some(TraceLevel::DEBUG));
    match cli.command {
        Commands::Import {
            test, date, output, limit,
        } => {
            assert!(test);
            assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 1));
            assert_eq!(output, None);
            assert_eq!(limit, 10);
        }
    }
}
