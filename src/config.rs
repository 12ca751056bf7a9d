// config.rs - Environment-driven service configuration
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// SMTP settings for contact-form mail. Absent when `SMTP_HOST` is unset.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub recipient: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub port: u16,
    pub s3_bucket: String,
    pub aws_region: String,
    pub s3_endpoint_url: Option<String>,
    pub signed_url_ttl: Duration,
    pub temp_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub scan_enabled: bool,
    pub allow_unscanned_uploads: bool,
    pub clamscan_path: String,
    pub scan_timeout: Duration,
    pub ytdlp_path: String,
    pub fetch_timeout: Duration,
    pub cors_origins: Vec<String>,
    pub smtp: Option<SmtpConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0".to_string(),
            port: 5000,
            s3_bucket: String::new(),
            aws_region: "us-east-1".to_string(),
            s3_endpoint_url: None,
            signed_url_ttl: Duration::from_secs(3600),
            temp_dir: std::env::temp_dir(),
            max_upload_bytes: 500 * 1024 * 1024,
            scan_enabled: true,
            allow_unscanned_uploads: false,
            clamscan_path: "clamscan".to_string(),
            scan_timeout: Duration::from_secs(120),
            ytdlp_path: "yt-dlp".to_string(),
            fetch_timeout: Duration::from_secs(300),
            cors_origins: vec!["http://localhost:3000".to_string()],
            smtp: None,
        }
    }
}

impl Config {
    /// Read configuration from the process environment (after `.env` is loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let s3_bucket = get("S3_BUCKET").ok_or(ConfigError::Missing("S3_BUCKET"))?;

        let smtp = match get("SMTP_HOST") {
            Some(host) => {
                let username = get("SMTP_USER");
                let from = get("SMTP_FROM")
                    .or_else(|| username.clone())
                    .ok_or(ConfigError::Missing("SMTP_FROM"))?;
                Some(SmtpConfig {
                    host,
                    port: parse_or("SMTP_PORT", get("SMTP_PORT"), 587)?,
                    username,
                    password: get("SMTP_PASSWORD"),
                    recipient: get("CONTACT_RECIPIENT").unwrap_or_else(|| from.clone()),
                    from,
                })
            }
            None => None,
        };

        Ok(Self {
            addr: get("ADDR").unwrap_or(defaults.addr),
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            s3_bucket,
            aws_region: get("AWS_REGION").unwrap_or(defaults.aws_region),
            s3_endpoint_url: get("S3_ENDPOINT_URL"),
            signed_url_ttl: Duration::from_secs(parse_or("SIGNED_URL_TTL_SECS", get("SIGNED_URL_TTL_SECS"), 3600)?),
            temp_dir: get("TEMP_DIR").map(PathBuf::from).unwrap_or(defaults.temp_dir),
            max_upload_bytes: parse_or::<u64>("MAX_UPLOAD_MB", get("MAX_UPLOAD_MB"), 500)? * 1024 * 1024,
            scan_enabled: parse_bool("SCAN_ENABLED", get("SCAN_ENABLED"), defaults.scan_enabled)?,
            allow_unscanned_uploads: parse_bool(
                "ALLOW_UNSCANNED_UPLOADS",
                get("ALLOW_UNSCANNED_UPLOADS"),
                defaults.allow_unscanned_uploads,
            )?,
            clamscan_path: get("CLAMSCAN_PATH").unwrap_or(defaults.clamscan_path),
            scan_timeout: Duration::from_secs(parse_or("SCAN_TIMEOUT_SECS", get("SCAN_TIMEOUT_SECS"), 120)?),
            ytdlp_path: get("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            fetch_timeout: Duration::from_secs(parse_or("FETCH_TIMEOUT_SECS", get("FETCH_TIMEOUT_SECS"), 300)?),
            cors_origins: get("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            smtp,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.addr, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid { name: "ADDR", value: raw })
    }
}

fn parse_or<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}
