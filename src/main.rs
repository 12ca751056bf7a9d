use std::sync::Arc;

use clip2gif::config::Config;
use clip2gif::fetch::UrlFetcher;
use clip2gif::handlers;
use clip2gif::mailer::{ContactNotifier, DisabledNotifier, SmtpMailer};
use clip2gif::scanner::ClamScanner;
use clip2gif::state::AppState;
use clip2gif::storage::S3Storage;
use clip2gif::utils::check_ffmpeg_available;
use clip2gif::workspace::Workspace;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging()?;

    let config = Config::from_env()?;

    if let Err(e) = check_ffmpeg_available() {
        tracing::warn!("{} Conversions and analysis will fail until it is installed.", e);
    }

    let workspace = Workspace::new(config.temp_dir.join("clip2gif"))?;
    tracing::info!(dir = %workspace.dir().display(), "Workspace directory ready");

    let storage = Arc::new(S3Storage::new(&config).await);
    let scanner = Arc::new(ClamScanner::new(config.clamscan_path.clone(), config.scan_timeout));
    let fetcher = Arc::new(UrlFetcher::new(
        config.ytdlp_path.clone(),
        config.max_upload_bytes,
        config.fetch_timeout,
    )?);

    let notifier: Arc<dyn ContactNotifier> = match config.smtp.clone() {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, "Contact mail enabled");
            Arc::new(SmtpMailer::new(smtp))
        }
        None => {
            tracing::warn!("SMTP_HOST not set. Contact form submissions will fail.");
            Arc::new(DisabledNotifier)
        }
    };

    if !config.scan_enabled {
        tracing::warn!("Malware scanning disabled (SCAN_ENABLED=false)");
    } else if config.allow_unscanned_uploads {
        tracing::warn!("Uploads are accepted when the scanner is unavailable (ALLOW_UNSCANNED_UPLOADS=true)");
    }

    let state = Arc::new(AppState::new(&config, storage, scanner, fetcher, notifier, workspace));
    let app = handlers::router(state);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,clip2gif=trace,aws_config=info,aws_smithy_runtime=info,hyper=info,tower=info".to_string()
        } else {
            "info,clip2gif=info,aws_config=warn,aws_smithy_runtime=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();

    tracing::info!("clip2gif starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Build mode: {}", if cfg!(debug_assertions) { "development" } else { "production" });
    tracing::info!("Log level: {}", log_level);

    Ok(())
}
