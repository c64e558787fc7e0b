/// Smallest shard size an operator may request
pub const MIN_ROWS_PER_SHARD: usize = 100;

/// Column names of every output shard, in write order
pub const FIELDNAMES: [&str; 5] = ["file_name", "newspaper_agency", "date", "headers", "body"];

/// UTF-8 byte-order mark written at the start of each shard
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Buffer size for shard writers
pub const CSV_BUFFER_SIZE: usize = 128 * 1024;

/// Extension of source documents when none is given
pub const DEFAULT_DOCUMENT_EXTENSION: &str = "pdf";

/// Extension of saved markdown renderings
pub const MARKDOWN_EXTENSION: &str = "md";

/// Suffix inserted before the shard number for shards after the first
pub const SHARD_SUFFIX: &str = "_part";

/// Progress update interval (tick every N documents)
pub const PROGRESS_INTERVAL: u64 = 10;
