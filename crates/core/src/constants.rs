//! Constants used throughout the clinic core crate.

/// Default directory for the document store when none is configured.
pub const DEFAULT_DATA_DIR: &str = "clinic_data";

/// Upload directory name under the data directory when none is configured.
pub const DEFAULT_UPLOAD_DIR_NAME: &str = "uploads";

/// Directory (under the data dir) holding named sequence counters.
pub const SEQUENCES_DIR_NAME: &str = "_sequences";

/// Extension for document files.
pub const DOCUMENT_EXTENSION: &str = "json";

/// Default list page size.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Default look-ahead window for expiring pharmacy stock.
pub const DEFAULT_EXPIRY_WINDOW_DAYS: u32 = 30;

/// Number of entries in "top items" report lists.
pub const TOP_ITEMS_LIMIT: usize = 5;
