//! Persistence of a run's records: the relational ratings table and the columnar snapshot.

pub mod parquet;
pub mod postgres;

pub use parquet::{file_name, write_parquet};
pub use postgres::upsert;
