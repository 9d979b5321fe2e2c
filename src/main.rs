use detailhub::{logging, AppConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = AppConfig::from_environment();
    logging::init_logging(&config.log);

    let recipient = match std::env::args().nth(1) {
        Some(r) => r,
        None => {
            eprintln!("usage: detailhub-mailcheck <recipient>");
            std::process::exit(2);
        }
    };

    if config.settings_path.is_none() && config.smtp.fallback_credentials.is_none() {
        error!("No SMTP settings: set DETAILHUB_SMTP_SETTINGS or SMTP_HOST / SMTP_FROM_EMAIL");
    }

    let outcome = detailhub::run_mailcheck(&config, &recipient).await;
    if outcome.success {
        info!(
            message_id = outcome.message_id.as_deref().unwrap_or(""),
            "{}", outcome.message
        );
    } else {
        error!("{}", outcome.message);
        std::process::exit(1);
    }
}
