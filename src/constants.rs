// -
// Database namespaces

/// Bucket holding log entries keyed by their 8-byte big-endian index
pub const LOGS_BUCKET: &str = "logs";
/// Bucket holding stable state (term, vote, snapshot metadata)
pub const CONF_BUCKET: &str = "conf";

/// Buckets created on every writable open, in migration copy order
pub(crate) const BUCKETS: [&str; 2] = [CONF_BUCKET, LOGS_BUCKET];

/// Permissions used when a database file has to be created
pub(crate) const DB_FILE_MODE: u32 = 0o600;

/// Sled always carries this tree; it is not a bucket of ours
pub(crate) const SLED_DEFAULT_TREE: &[u8] = b"__sled__default";

// -
// Metric names reported after each batch write

pub const METRIC_LOG_SIZE: &str = "log_size";
pub const METRIC_LOGS_PER_BATCH: &str = "logs_per_batch";
pub const METRIC_LOG_BATCH_SIZE: &str = "log_batch_size";
pub const METRIC_WRITE_CAPACITY: &str = "write_capacity";
pub const METRIC_STORE_LOGS: &str = "store_logs";
