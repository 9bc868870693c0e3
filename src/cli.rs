use clap::{Parser, Subcommand};

use crate::commands;
use crate::config::Settings;

#[derive(Parser)]
#[command(name = "hkex-settlement")]
#[command(about = "HKEX settlement price parser CLI", long_about = None)]
#[command(after_help = "Examples:
  hkex-settlement download 2023-08-22
  hkex-settlement search HTI --date 2023-08-22
  hkex-settlement list-dates
  hkex-settlement symbols 2023-08-22
  hkex-settlement history HTI2308 --start 2023-08-01
  hkex-settlement health")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download and parse settlement data for a trading date
    Download {
        /// Trading date (YYYY-MM-DD)
        date: String,
    },
    /// Search for a symbol (series prefix)
    Search {
        /// Symbol to search for
        symbol: String,
        /// Trading date (YYYY-MM-DD). If not provided, uses latest available date
        #[arg(long)]
        date: Option<String>,
    },
    /// List available trading dates
    ListDates,
    /// List symbols for a date
    Symbols {
        /// Trading date (YYYY-MM-DD)
        date: String,
    },
    /// Show settlement history for one series
    History {
        /// Exact series, e.g. HTI2308
        symbol: String,
        /// Start date (YYYY-MM-DD), default 30 days before end
        #[arg(long)]
        start: Option<String>,
        /// End date (YYYY-MM-DD), default today
        #[arg(long)]
        end: Option<String>,
    },
    /// Check system health
    Health,
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (default: PORT env or 8000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

pub async fn run(settings: Settings) {
    let cli = Cli::parse();

    match cli.command {
        Commands::Download { date } => {
            commands::download::run(&settings, &date).await;
        }
        Commands::Search { symbol, date } => {
            commands::search::run(&settings, &symbol, date.as_deref()).await;
        }
        Commands::ListDates => {
            commands::list_dates::run(&settings).await;
        }
        Commands::Symbols { date } => {
            commands::symbols::run(&settings, &date).await;
        }
        Commands::History { symbol, start, end } => {
            commands::history::run(&settings, &symbol, start.as_deref(), end.as_deref()).await;
        }
        Commands::Health => {
            commands::health::run(&settings).await;
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(settings.port);
            commands::serve::run(&settings, port).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_with_date() {
        let cli = Cli::try_parse_from(["hkex-settlement", "search", "HTI", "--date", "2023-08-22"]).unwrap();
        match cli.command {
            Commands::Search { symbol, date } => {
                assert_eq!(symbol, "HTI");
                assert_eq!(date.as_deref(), Some("2023-08-22"));
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_parse_list_dates_and_serve() {
        let cli = Cli::try_parse_from(["hkex-settlement", "list-dates"]).unwrap();
        assert!(matches!(cli.command, Commands::ListDates));

        let cli = Cli::try_parse_from(["hkex-settlement", "serve", "--port", "9000"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: Some(9000) }));
    }

    #[test]
    fn test_download_requires_date() {
        assert!(Cli::try_parse_from(["hkex-settlement", "download"]).is_err());
    }
}
