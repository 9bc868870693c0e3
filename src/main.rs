use hkex_settlement::{cli, utils, Settings};

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    utils::init_tracing(&settings.log_level);
    tracing::debug!(?settings, "Loaded settings");

    cli::run(settings).await;
}
