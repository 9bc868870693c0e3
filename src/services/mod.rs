pub mod file_fetcher;
pub mod pipeline;
pub mod settlement_parser;

pub use file_fetcher::{DocumentFetcher, FetchGate, HttpFetcher, SharedFetcher};
pub use pipeline::{SettlementPipeline, SharedPipeline};
pub use settlement_parser::{parse_document, ParsedDocument};
