//! Configuration module
//!
//! Settings for the intake API and the scan worker are read from the
//! environment (and an optional `.env` file) into one `Config`.

use std::collections::HashMap;
use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const LOCAL_STORAGE_CONTAINER: &str = "local-uploads";
const TRUSTED_LOCAL_CONTAINER: &str = "local-trusted";
const CLAMSCAN_PATH: &str = "/opt/bin/clamscan";
const CLAMAV_DB_PATH: &str = "/opt/var/lib/clamav";
const CLAMAV_HOST: &str = "localhost";
const CLAMAV_PORT: u16 = 3310;
const SCAN_TIMEOUT_SECS: u64 = 120;
const MAX_ENGINE_OUTPUT_CHARS: usize = 2048;
const WORKER_MAX_CONCURRENCY: usize = 4;
const SQS_WAIT_TIME_SECS: i32 = 20;
const SQS_MAX_MESSAGES: i32 = 10;
const MAX_UPLOAD_SIZE_MB: usize = 50;
const ALLOWED_EXTENSIONS: &str = "pdf,docx,xlsx,png,jpg,zip";

/// Which ledger implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    Postgres,
    Memory,
}

impl FromStr for LedgerBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(LedgerBackend::Postgres),
            "memory" => Ok(LedgerBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid ledger backend: {}", s)),
        }
    }
}

impl Display for LedgerBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            LedgerBackend::Postgres => write!(f, "postgres"),
            LedgerBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Scanning engine flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// `clamscan` executable run once per object
    ClamScan,
    /// long running clamd daemon reached over TCP
    Clamd,
}

impl FromStr for EngineKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clamscan" => Ok(EngineKind::ClamScan),
            "clamd" => Ok(EngineKind::Clamd),
            _ => Err(anyhow::anyhow!("Invalid scan engine: {}", s)),
        }
    }
}

impl Display for EngineKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            EngineKind::ClamScan => write!(f, "clamscan"),
            EngineKind::Clamd => write!(f, "clamd"),
        }
    }
}

/// Where the worker receives storage notifications from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSourceKind {
    Sqs,
    Inline,
}

impl FromStr for NotificationSourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqs" => Ok(NotificationSourceKind::Sqs),
            "inline" => Ok(NotificationSourceKind::Inline),
            _ => Err(anyhow::anyhow!("Invalid notification source: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScanVaultConfig {
    pub environment: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub log_format: LogFormat,
    // Ledger
    pub ledger_backend: LedgerBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Raw intake store
    pub storage_backend: StorageBackend,
    pub upload_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_container: String,
    // Trusted store
    pub trusted_bucket: Option<String>,
    pub trusted_local_storage_path: Option<String>,
    pub trusted_local_container: String,
    // Scan engine
    pub scan_engine: EngineKind,
    pub clamscan_path: String,
    pub clamav_db_path: String,
    pub clamav_host: String,
    pub clamav_port: u16,
    pub scan_timeout_secs: u64,
    pub max_engine_output_chars: usize,
    pub scan_scratch_dir: Option<PathBuf>,
    // Worker
    pub worker_max_concurrency: usize,
    pub notification_source: NotificationSourceKind,
    pub sqs_queue_url: Option<String>,
    pub sqs_wait_time_secs: i32,
    pub sqs_max_messages: i32,
    pub inline_worker: bool,
    // Intake
    pub max_upload_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
}

impl ScanVaultConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = var("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let server_port = match var("PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            None => SERVER_PORT,
        };

        let database_url = var("DATABASE_URL");
        let ledger_backend = match var("LEDGER_BACKEND") {
            Some(s) => s.parse()?,
            None if database_url.is_some() => LedgerBackend::Postgres,
            None => LedgerBackend::Memory,
        };

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(s) => s.parse()?,
            None => StorageBackend::S3,
        };

        let scan_engine = match var("SCAN_ENGINE") {
            Some(s) => s.parse()?,
            None => EngineKind::ClamScan,
        };

        let notification_source = match var("NOTIFICATION_SOURCE") {
            Some(s) => s.parse()?,
            None => NotificationSourceKind::Sqs,
        };

        let log_format = var("LOG_FORMAT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(LogFormat::Compact);

        let max_upload_size_mb = var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let allowed_extensions = var("ALLOWED_EXTENSIONS")
            .unwrap_or_else(|| ALLOWED_EXTENSIONS.to_string())
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(ScanVaultConfig {
            environment,
            server_port,
            cors_origins,
            log_format,
            ledger_backend,
            database_url,
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            upload_bucket: var("UPLOAD_BUCKET").or_else(|| var("S3_BUCKET")),
            s3_region: var("S3_REGION"),
            s3_endpoint: var("S3_ENDPOINT"),
            aws_region: var("AWS_REGION"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_container: var("LOCAL_STORAGE_CONTAINER")
                .unwrap_or_else(|| LOCAL_STORAGE_CONTAINER.to_string()),
            trusted_bucket: var("TRUSTED_BUCKET").or_else(|| var("SAFE_BUCKET")),
            trusted_local_storage_path: var("TRUSTED_LOCAL_STORAGE_PATH"),
            trusted_local_container: var("TRUSTED_LOCAL_CONTAINER")
                .unwrap_or_else(|| TRUSTED_LOCAL_CONTAINER.to_string()),
            scan_engine,
            clamscan_path: var("CLAMSCAN_PATH").unwrap_or_else(|| CLAMSCAN_PATH.to_string()),
            clamav_db_path: var("CLAMAV_DB_PATH").unwrap_or_else(|| CLAMAV_DB_PATH.to_string()),
            clamav_host: var("CLAMAV_HOST").unwrap_or_else(|| CLAMAV_HOST.to_string()),
            clamav_port: var("CLAMAV_PORT")
                .unwrap_or_else(|| CLAMAV_PORT.to_string())
                .parse()
                .unwrap_or(CLAMAV_PORT),
            scan_timeout_secs: var("SCAN_TIMEOUT_SECS")
                .unwrap_or_else(|| SCAN_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(SCAN_TIMEOUT_SECS),
            max_engine_output_chars: var("MAX_ENGINE_OUTPUT_CHARS")
                .unwrap_or_else(|| MAX_ENGINE_OUTPUT_CHARS.to_string())
                .parse()
                .unwrap_or(MAX_ENGINE_OUTPUT_CHARS),
            scan_scratch_dir: var("SCAN_SCRATCH_DIR").map(PathBuf::from),
            worker_max_concurrency: var("WORKER_MAX_CONCURRENCY")
                .unwrap_or_else(|| WORKER_MAX_CONCURRENCY.to_string())
                .parse()
                .unwrap_or(WORKER_MAX_CONCURRENCY),
            notification_source,
            sqs_queue_url: var("SQS_QUEUE_URL"),
            sqs_wait_time_secs: var("SQS_WAIT_TIME_SECS")
                .unwrap_or_else(|| SQS_WAIT_TIME_SECS.to_string())
                .parse()
                .unwrap_or(SQS_WAIT_TIME_SECS),
            sqs_max_messages: var("SQS_MAX_MESSAGES")
                .unwrap_or_else(|| SQS_MAX_MESSAGES.to_string())
                .parse()
                .unwrap_or(SQS_MAX_MESSAGES),
            inline_worker: var("INLINE_WORKER")
                .unwrap_or_else(|| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            allowed_extensions,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.ledger_backend == LedgerBackend::Postgres {
            let url = self.database_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!("DATABASE_URL must be set when LEDGER_BACKEND=postgres")
            })?;
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.upload_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "UPLOAD_BUCKET or S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.region().is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        if self.trusted_bucket.is_some() && self.region().is_none() {
            return Err(anyhow::anyhow!(
                "S3_REGION or AWS_REGION must be set when TRUSTED_BUCKET is configured"
            ));
        }

        if self.scan_timeout_secs == 0 {
            return Err(anyhow::anyhow!("SCAN_TIMEOUT_SECS must be greater than 0"));
        }

        if self.worker_max_concurrency == 0 {
            return Err(anyhow::anyhow!(
                "WORKER_MAX_CONCURRENCY must be greater than 0"
            ));
        }

        if !(1..=10).contains(&self.sqs_max_messages) {
            return Err(anyhow::anyhow!("SQS_MAX_MESSAGES must be between 1 and 10"));
        }

        if !(0..=20).contains(&self.sqs_wait_time_secs) {
            return Err(anyhow::anyhow!(
                "SQS_WAIT_TIME_SECS must be between 0 and 20"
            ));
        }

        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_EXTENSIONS must list at least one extension"
            ));
        }

        Ok(())
    }

    fn region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ScanVaultConfig>);

impl Config {
    fn inner(&self) -> &ScanVaultConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.inner().environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ScanVaultConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    /// Build a configuration from explicit variables, ignoring the process environment.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let config = ScanVaultConfig::from_lookup(|key| vars.get(key).cloned())?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    // Convenience getters for common fields
    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().cors_origins
    }

    pub fn log_format(&self) -> LogFormat {
        self.inner().log_format
    }

    pub fn ledger_backend(&self) -> LedgerBackend {
        self.inner().ledger_backend
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn upload_bucket(&self) -> Option<&str> {
        self.inner().upload_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_container(&self) -> &str {
        &self.inner().local_storage_container
    }

    pub fn trusted_bucket(&self) -> Option<&str> {
        self.inner().trusted_bucket.as_deref()
    }

    pub fn trusted_local_storage_path(&self) -> Option<&str> {
        self.inner().trusted_local_storage_path.as_deref()
    }

    pub fn trusted_local_container(&self) -> &str {
        &self.inner().trusted_local_container
    }

    pub fn scan_engine(&self) -> EngineKind {
        self.inner().scan_engine
    }

    pub fn clamscan_path(&self) -> &str {
        &self.inner().clamscan_path
    }

    pub fn clamav_db_path(&self) -> &str {
        &self.inner().clamav_db_path
    }

    pub fn clamav_host(&self) -> &str {
        &self.inner().clamav_host
    }

    pub fn clamav_port(&self) -> u16 {
        self.inner().clamav_port
    }

    pub fn scan_timeout_secs(&self) -> u64 {
        self.inner().scan_timeout_secs
    }

    pub fn max_engine_output_chars(&self) -> usize {
        self.inner().max_engine_output_chars
    }

    pub fn scan_scratch_dir(&self) -> Option<&PathBuf> {
        self.inner().scan_scratch_dir.as_ref()
    }

    pub fn worker_max_concurrency(&self) -> usize {
        self.inner().worker_max_concurrency
    }

    pub fn notification_source(&self) -> NotificationSourceKind {
        self.inner().notification_source
    }

    pub fn sqs_queue_url(&self) -> Option<&str> {
        self.inner().sqs_queue_url.as_deref()
    }

    pub fn sqs_wait_time_secs(&self) -> i32 {
        self.inner().sqs_wait_time_secs
    }

    pub fn sqs_max_messages(&self) -> i32 {
        self.inner().sqs_max_messages
    }

    pub fn inline_worker(&self) -> bool {
        self.inner().inline_worker
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.inner().max_upload_size_bytes
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.inner().allowed_extensions
    }
}
