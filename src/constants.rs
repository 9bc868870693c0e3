//! Settlement File Format Constants
//!
//! Defines the layout of the HKEX daily settlement price file (`spDDMMYY.dat`)
//! and the cache/TTL policy used around it.
//!
//! ## File Layout
//!
//! ```text
//! <free-form preamble lines, ignored>
//! Series  Expiry  Strike  Call/Put  Settlement  Volume  Open Interest
//! HTI2308 2023-08-25 18000 Call 0.1234 100 50
//! ...
//! <optional blank lines, ignored>
//! ```
//!
//! The header is located by its first token (`Series`). Data rows are split on
//! whitespace and mapped positionally onto the header columns.

/// First token of the header line
pub const HEADER_SENTINEL: &str = "Series";

/// Header columns that the exchange writes as more than one word.
///
/// The tokenizer joins these back together so the header yields exactly one
/// column per data token.
pub const COMPOUND_COLUMNS: &[&[&str]] = &[&["Open", "Interest"]];

/// Column names consumed by the record normalizer
pub mod column {
    pub const SERIES: &str = "Series";
    pub const EXPIRY: &str = "Expiry";
    pub const STRIKE: &str = "Strike";
    pub const CALL_PUT: &str = "Call/Put";
    pub const SETTLEMENT: &str = "Settlement";
    pub const VOLUME: &str = "Volume";
    pub const OPEN_INTEREST: &str = "Open Interest";
}

/// Default download location for settlement files
pub const DEFAULT_HKEX_BASE_URL: &str = "https://hkex.com/hk/eng/stat/dmstat/datadownload";

/// Network timeout for a single settlement file download
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default HTTP port for `serve`
pub const DEFAULT_PORT: u16 = 8000;

/// Cache namespaces
///
/// One physical cache store backs three logical caches. Each gets its own key
/// prefix and TTL policy:
///
/// | Namespace  | Prefix    | Content                           | TTL        |
/// |------------|-----------|-----------------------------------|------------|
/// | documents  | `doc:`    | raw settlement file text          | 1 hour     |
/// | queries    | `query:`  | symbol searches, trading dates    | 30m / 1h   |
/// | config     | `config:` | per-date run metadata             | none       |
pub mod cache {
    pub const DOCUMENT_PREFIX: &str = "doc:";
    pub const QUERY_PREFIX: &str = "query:";
    pub const CONFIG_PREFIX: &str = "config:";

    /// Raw settlement file TTL
    pub const DOCUMENT_TTL_SECS: u64 = 3600;

    /// Symbol search result TTL
    pub const SYMBOL_SEARCH_TTL_SECS: u64 = 1800;

    /// Trading date list TTL
    pub const TRADING_DATES_TTL_SECS: u64 = 3600;

    pub const TRADING_DATES_KEY: &str = "trading_dates";
}

/// Largest date range accepted by a range search (inclusive days)
pub const MAX_SEARCH_RANGE_DAYS: i64 = 366;

/// Default lookback for series history queries when no start date is given
pub const DEFAULT_HISTORY_DAYS: i64 = 30;
