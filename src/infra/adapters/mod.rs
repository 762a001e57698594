pub mod postgres;
pub mod snapshot;

pub use postgres::PostgresAdapter;
pub use snapshot::JsonSnapshotSource;
