//! Configuration of the certmint daemon.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt, fs, io};

use clap::Parser;
use log::{LevelFilter, error, info};
use serde::{Deserialize, Deserializer, de};
#[cfg(unix)]
use syslog::Facility;

use crate::commons::ext_serde;
use crate::constants::*;
use crate::engine::context::{IssuancePolicy, SubjectDefaults, days_to_duration};

//------------ Options -------------------------------------------------------

/// The command line options of the daemon.
///
/// Values given here take precedence over the config file.
#[derive(Clone, Debug, Default, Parser)]
#[command(
    name = CERTMINT_SERVER_APP,
    version,
    about = "Issues short-lived TLS certificates signed by a local CA.",
)]
pub struct Options {
    /// Path to the config file
    #[arg(short, long, env = CERTMINT_ENV_CONFIG, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the PEM encoded CA certificate
    #[arg(long, value_name = "FILE")]
    pub cacert: Option<PathBuf>,

    /// Path to the PEM encoded CA private key
    #[arg(long, value_name = "FILE")]
    pub cakey: Option<PathBuf>,

    /// Add the causes of internal errors to API responses
    #[arg(long)]
    pub development: bool,

    /// Address and port to listen on, e.g. 127.0.0.1:8080
    #[arg(short, long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,
}

//------------ ConfigDefaults ------------------------------------------------

pub struct ConfigDefaults;

impl ConfigDefaults {
    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }

    fn port() -> u16 {
        DEFAULT_PORT
    }

    fn key_bits() -> u32 {
        DEFAULT_KEY_BITS
    }

    fn validity_days() -> u32 {
        DEFAULT_VALIDITY_DAYS
    }

    fn subject_locality() -> String {
        DEFAULT_SUBJECT_LOCALITY.to_string()
    }

    fn subject_province() -> String {
        DEFAULT_SUBJECT_PROVINCE.to_string()
    }

    fn subject_country() -> String {
        DEFAULT_SUBJECT_COUNTRY.to_string()
    }

    fn key_pool_size() -> usize {
        DEFAULT_KEY_POOL_SIZE
    }

    fn key_pool_refill_seconds() -> u64 {
        DEFAULT_KEY_POOL_REFILL_SECONDS
    }

    /// The level from the environment, or info.
    ///
    /// An unparseable value is reported by [`Config::verify`].
    fn log_level() -> LevelFilter {
        env_log_level(env::var(CERTMINT_ENV_LOG_LEVEL).ok())
            .unwrap_or(LevelFilter::Info)
    }

    fn log_type() -> LogType {
        LogType::Stderr
    }

    fn log_file() -> PathBuf {
        PathBuf::from("./certmint.log")
    }

    fn syslog_facility() -> String {
        "daemon".to_string()
    }
}

/// Parses the value of the log level environment variable.
fn env_log_level(value: Option<String>) -> Result<LevelFilter, ConfigError> {
    match value {
        Some(level) => LevelFilter::from_str(&level).map_err(|_| {
            ConfigError::Other(format!(
                "Unrecognized value for log level in env var \
                 {CERTMINT_ENV_LOG_LEVEL}: '{level}'"
            ))
        }),
        None => Ok(LevelFilter::Info),
    }
}

//------------ Config --------------------------------------------------------

/// Global configuration for the certmint daemon.
///
/// Read from an optional TOML file, every missing setting takes its
/// default. Command line options override the file.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ca_cert: PathBuf,

    #[serde(default)]
    pub ca_key: PathBuf,

    #[serde(default = "ConfigDefaults::ip")]
    pub ip: IpAddr,

    #[serde(default = "ConfigDefaults::port")]
    pub port: u16,

    #[serde(default)]
    pub development: bool,

    #[serde(default = "ConfigDefaults::key_bits")]
    pub key_bits: u32,

    #[serde(default = "ConfigDefaults::validity_days")]
    pub validity_days: u32,

    #[serde(default = "ConfigDefaults::subject_locality")]
    pub subject_locality: String,

    #[serde(default = "ConfigDefaults::subject_province")]
    pub subject_province: String,

    #[serde(default = "ConfigDefaults::subject_country")]
    pub subject_country: String,

    #[serde(default)]
    pub key_pool_enabled: bool,

    #[serde(default = "ConfigDefaults::key_pool_size")]
    pub key_pool_size: usize,

    #[serde(default = "ConfigDefaults::key_pool_refill_seconds")]
    pub key_pool_refill_seconds: u64,

    #[serde(
        default = "ConfigDefaults::log_level",
        deserialize_with = "ext_serde::de_level_filter"
    )]
    pub log_level: LevelFilter,

    #[serde(default = "ConfigDefaults::log_type")]
    pub log_type: LogType,

    #[serde(default = "ConfigDefaults::log_file")]
    pub log_file: PathBuf,

    #[serde(default = "ConfigDefaults::syslog_facility")]
    pub syslog_facility: String,
}

/// # Accessors
impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    pub fn issuance_policy(&self) -> IssuancePolicy {
        IssuancePolicy {
            key_bits: self.key_bits,
            validity: days_to_duration(self.validity_days),
            subject: SubjectDefaults {
                locality: self.subject_locality.clone(),
                province: self.subject_province.clone(),
                country: self.subject_country.clone(),
            },
        }
    }

    pub fn key_pool_refill_interval(&self) -> Duration {
        Duration::from_secs(self.key_pool_refill_seconds)
    }
}

/// # Create and verify
impl Config {
    /// Creates the config at startup from the command line and config file.
    ///
    /// Also initializes logging.
    pub fn create() -> Result<Self, ConfigError> {
        let options = Options::parse();
        let config = Self::from_options(&options)?;
        config.verify()?;
        config.init_logging()?;

        match &options.config {
            Some(path) => info!(
                "{} uses configuration file: {}",
                CERTMINT_SERVER_APP,
                path.display()
            ),
            None => info!("{CERTMINT_SERVER_APP} uses default configuration"),
        }
        Ok(config)
    }

    /// Builds the config from parsed options without verifying it.
    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        let mut config = match &options.config {
            Some(path) => Self::read_config(path).map_err(|e| {
                ConfigError::Other(format!(
                    "Error parsing config file: {}, error: {}",
                    path.display(),
                    e
                ))
            })?,
            None => Self::parse_str("")?,
        };

        if let Some(ca_cert) = &options.cacert {
            config.ca_cert = ca_cert.clone();
        }
        if let Some(ca_key) = &options.cakey {
            config.ca_key = ca_key.clone();
        }
        if options.development {
            config.development = true;
        }
        if let Some(addr) = options.listen {
            config.ip = addr.ip();
            config.port = addr.port();
        }

        Ok(config)
    }

    pub fn read_config(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    fn parse_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::TomlError)
    }

    pub fn verify(&self) -> Result<(), ConfigError> {
        env_log_level(env::var(CERTMINT_ENV_LOG_LEVEL).ok())?;

        if self.ca_cert.as_os_str().is_empty() {
            return Err(ConfigError::other(
                "ca_cert must be set in the config file or with --cacert",
            ));
        }

        if self.ca_key.as_os_str().is_empty() {
            return Err(ConfigError::other(
                "ca_key must be set in the config file or with --cakey",
            ));
        }

        if self.key_bits < MIN_KEY_BITS {
            return Err(ConfigError::Other(format!(
                "key_bits must be at least {MIN_KEY_BITS}"
            )));
        }

        if self.validity_days < 1 {
            return Err(ConfigError::other("validity_days must be at least 1"));
        }

        if self.key_pool_size < 1 {
            return Err(ConfigError::other("key_pool_size must be at least 1"));
        }

        if self.key_pool_enabled && self.key_pool_refill_seconds < 1 {
            return Err(ConfigError::other(
                "key_pool_refill_seconds must be at least 1",
            ));
        }

        Ok(())
    }

    /// A config for tests: listens on an ephemeral port on localhost.
    pub fn test(ca_cert: &Path, ca_key: &Path) -> Self {
        let mut config = Self::parse_str("").unwrap();
        config.ca_cert = ca_cert.to_path_buf();
        config.ca_key = ca_key.to_path_buf();
        config.ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.port = 0;
        config.development = true;
        config
    }
}

/// # Logging
impl Config {
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        match self.log_type {
            LogType::File => self.file_logger(&self.log_file),
            LogType::Stderr => self.stderr_logger(),
            LogType::Syslog => self.syslog_logger(),
        }
    }

    /// Creates a stderr logger.
    fn stderr_logger(&self) -> Result<(), ConfigError> {
        self.fern_logger()
            .chain(io::stderr())
            .apply()
            .map_err(|e| {
                ConfigError::Other(format!("Failed to init stderr logging: {e}"))
            })
    }

    /// Creates a file logger using the file provided by `path`.
    fn file_logger(&self, path: &Path) -> Result<(), ConfigError> {
        let file = match fern::log_file(path) {
            Ok(file) => file,
            Err(err) => {
                let error_string = format!(
                    "Failed to open log file '{}': {}",
                    path.display(),
                    err
                );
                error!("{}", error_string.as_str());
                return Err(ConfigError::Other(error_string));
            }
        };
        self.fern_logger()
            .chain(file)
            .apply()
            .map_err(|e| {
                ConfigError::Other(format!("Failed to init file logging: {e}"))
            })
    }

    /// Creates a syslog logger and configures correctly.
    #[cfg(unix)]
    fn syslog_logger(&self) -> Result<(), ConfigError> {
        let facility = Facility::from_str(&self.syslog_facility)
            .map_err(|_| ConfigError::other("Invalid syslog_facility"))?;

        let process = env::current_exe()
            .ok()
            .and_then(|path| {
                path.file_name()
                    .and_then(std::ffi::OsStr::to_str)
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| String::from(CERTMINT_SERVER_APP));
        let formatter = syslog::Formatter3164 {
            facility,
            hostname: None,
            process,
            pid: std::process::id(),
        };
        let logger = syslog::unix(formatter.clone())
            .or_else(|_| syslog::tcp(formatter.clone(), ("127.0.0.1", 601)))
            .or_else(|_| {
                syslog::udp(formatter, ("127.0.0.1", 0), ("127.0.0.1", 514))
            });
        match logger {
            Ok(logger) => self
                .fern_logger()
                .chain(logger)
                .apply()
                .map_err(|e| {
                    ConfigError::Other(format!("Failed to init syslog: {e}"))
                }),
            Err(err) => {
                let msg = format!("Cannot connect to syslog: {err}");
                Err(ConfigError::Other(msg))
            }
        }
    }

    #[cfg(not(unix))]
    fn syslog_logger(&self) -> Result<(), ConfigError> {
        Err(ConfigError::other(
            "syslog logging is not supported on this platform",
        ))
    }

    /// Creates and returns a fern logger with log level tweaks
    fn fern_logger(&self) -> fern::Dispatch {
        // suppress overly noisy logging
        let framework_level = self.log_level.min(LevelFilter::Warn);

        let show_target = self.log_level == LevelFilter::Trace
            || self.log_level == LevelFilter::Debug;
        fern::Dispatch::new()
            .format(move |out, message, record| {
                if show_target {
                    out.finish(format_args!(
                        "{} [{}] [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        record.target(),
                        message
                    ))
                } else {
                    out.finish(format_args!(
                        "{} [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        message
                    ))
                }
            })
            .level(self.log_level)
            .level_for("rustls", framework_level)
            .level_for("hyper", framework_level)
            .level_for("hyper_util", framework_level)
            .level_for("mio", framework_level)
            .level_for("reqwest", framework_level)
            .level_for("want", framework_level)
            .level_for("h2", framework_level)
    }
}

//------------ ConfigError ---------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    TomlError(toml::de::Error),
    Other(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => e.fmt(f),
            ConfigError::TomlError(e) => e.fmt(f),
            ConfigError::Other(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn other(s: &str) -> ConfigError {
        ConfigError::Other(s.to_string())
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::IoError(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::TomlError(e)
    }
}

//------------ LogType -------------------------------------------------------

/// The target to log to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogType {
    Stderr,
    File,
    Syslog,
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D>(d: D) -> Result<LogType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        match string.as_str() {
            "stderr" => Ok(LogType::Stderr),
            "file" => Ok(LogType::File),
            "syslog" => Ok(LogType::Syslog),
            _ => Err(de::Error::custom(format!(
                "expected \"stderr\", \"file\" or \"syslog\", found: \"{string}\""
            ))),
        }
    }
}

//------------ Tests ---------------------------------------------------------
