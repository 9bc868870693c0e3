mod pipeline_result;
mod settlement_record;
mod trading_date;

pub use pipeline_result::{PipelineResult, RunStatus};
pub use settlement_record::{OptionType, SettlementRecord, StoredSettlementRecord};
pub use trading_date::{RunMetadata, SummaryStatus, TradingDateSummary};
