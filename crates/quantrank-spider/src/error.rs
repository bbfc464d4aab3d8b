use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the spider can report.
///
/// Fatal variants abort the run before anything is persisted: `TransportFailure`,
/// `InvalidResponseStatus`, `MalformedPayload`, `BelowThresholdResult` and
/// `DegradedRatings`. The per-entry variants (`FieldCoercionFailure`,
/// `UnresolvedRelationship`, `IdentityLinkRejected`) are logged by their caller and
/// the run carries on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("invalid response status {status} from {url}")]
    InvalidResponseStatus { url: String, status: u16 },

    #[error("malformed payload from {url}: {reason}")]
    MalformedPayload { url: String, reason: String },

    #[error("screener matched {count} tickers, below the threshold of {threshold}")]
    BelowThresholdResult { count: u64, threshold: u64 },

    #[error("cannot coerce {field} from {found} into {target}")]
    FieldCoercionFailure {
        field: String,
        found: &'static str,
        target: &'static str,
    },

    #[error("unresolved relationship: {0}")]
    UnresolvedRelationship(String),

    #[error("identity link rejected for [{symbol}]: {reason}")]
    IdentityLinkRejected { symbol: String, reason: String },

    #[error("sink write failure: {0}")]
    SinkWriteFailure(String),

    #[error("{field} is zero for every record")]
    DegradedRatings { field: &'static str },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Database(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors that invalidate the whole run, as opposed to a single entry or field.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::FieldCoercionFailure { .. }
                | Error::UnresolvedRelationship(_)
                | Error::IdentityLinkRejected { .. }
        )
    }
}
