//! Various certmint-wide constants.

//------------ Binary Names -------------------------------------------------

/// The friendly name of the `certmint` binary.
pub const CERTMINT_SERVER_APP: &str = "certmint";

/// The user agent used by [`CertmintClient`][crate::client::CertmintClient].
pub const CERTMINT_CLIENT_USER_AGENT: &str =
    concat!("certmint-client/", env!("CARGO_PKG_VERSION"));

//------------ Environment Variables ----------------------------------------

/// The environment variable with the path to the config file.
pub const CERTMINT_ENV_CONFIG: &str = "CERTMINT_CONFIG";

/// The environment variable with the log level.
///
/// The variable should contain the name of a [`log::LevelFilter`]. It will
/// be overwritten by the config file. The default is “info.”
pub const CERTMINT_ENV_LOG_LEVEL: &str = "CERTMINT_LOG_LEVEL";

/// The environment variable that makes rustls write TLS session keys.
///
/// See: https://wiki.wireshark.org/TLS#tls-decryption
pub const SSLKEYLOGFILE_ENV_VAR_NAME: &str = "SSLKEYLOGFILE";

//------------ Issuance Defaults --------------------------------------------

pub const DEFAULT_KEY_BITS: u32 = 2048;

/// Smallest RSA key size accepted in the configuration.
pub const MIN_KEY_BITS: u32 = 1024;

pub const DEFAULT_VALIDITY_DAYS: u32 = 30;

pub const DEFAULT_SUBJECT_LOCALITY: &str = "Saint Louis";
pub const DEFAULT_SUBJECT_PROVINCE: &str = "Missouri";
pub const DEFAULT_SUBJECT_COUNTRY: &str = "US";

//------------ Key Pool Defaults --------------------------------------------

pub const DEFAULT_KEY_POOL_SIZE: usize = 10;
pub const DEFAULT_KEY_POOL_REFILL_SECONDS: u64 = 5;

//------------ HTTP ---------------------------------------------------------

pub const DEFAULT_PORT: u16 = 8080;

/// Timeout for requests made by the client, including key generation on
/// the server side.
pub const HTTP_CLIENT_TIMEOUT_SECS: u64 = 120;

/// Path prefix of the issuance endpoint. The rest of the path is the domain.
pub const NEWCERT_PATH_PREFIX: &str = "/newcert/";

/// Path of the endpoint returning the CA certificate.
pub const CA_CERT_PATH: &str = "/ca";

/// Query parameter asking for a client authentication certificate.
pub const CLIENT_AUTH_PARAM: &str = "client";
