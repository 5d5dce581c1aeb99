//! Defines all certmint errors.

use std::collections::HashMap;
use std::{fmt, io};

use hyper::StatusCode;
use openssl::error::ErrorStack;
use serde::{Deserialize, Serialize};

//------------ Error ---------------------------------------------------------

/// The errors of the issuance engine and the layers around it.
#[derive(Debug)]
pub enum Error {
    /// CA material is missing, unreadable or unparseable at load time.
    Config(String),

    /// Issuance was attempted before the CA context was loaded.
    Validation(String),

    /// The requested domain is malformed.
    Domain(String),

    /// Key generation, serial generation or signing failed.
    Signing(String),

    /// PEM or DER data is malformed.
    Encoding(String),

    /// A client asked for a response format we cannot produce.
    UnsupportedFormat(String),
}

impl Error {
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    pub fn validation(msg: impl fmt::Display) -> Self {
        Error::Validation(msg.to_string())
    }

    pub fn domain(domain: &str) -> Self {
        Error::Domain(domain.to_string())
    }

    pub fn signing(msg: impl fmt::Display) -> Self {
        Error::Signing(msg.to_string())
    }

    pub fn encoding(msg: impl fmt::Display) -> Self {
        Error::Encoding(msg.to_string())
    }

    pub fn unsupported_format(media_type: &str) -> Self {
        Error::UnsupportedFormat(media_type.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Invalid CA configuration: {msg}"),
            Error::Validation(msg) => write!(f, "CA context not ready: {msg}"),
            Error::Domain(domain) => {
                write!(
                    f,
                    "Domain must be ASCII and contain at least one dot: '{domain}'"
                )
            }
            Error::Signing(msg) => write!(f, "Signing issue: {msg}"),
            Error::Encoding(msg) => write!(f, "Encoding issue: {msg}"),
            Error::UnsupportedFormat(media_type) => {
                write!(f, "Unsupported accept content type: {media_type}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<CertIoError> for Error {
    fn from(e: CertIoError) -> Self {
        Error::Config(e.to_string())
    }
}

/// Translate an error to an HTTP Status Code
impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Domain(_) => StatusCode::BAD_REQUEST,
            Error::UnsupportedFormat(_) => StatusCode::NOT_ACCEPTABLE,
            Error::Validation(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_) | Error::Signing(_) | Error::Encoding(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the response shown to API clients.
    ///
    /// Messages for internal failures are fixed strings. Config errors in
    /// particular carry file paths which must not leave the server.
    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            Error::Config(_) => ErrorResponse::new(
                "sys-config",
                "certificate authority material is not available",
            ),
            Error::Validation(_) => ErrorResponse::new(
                "sys-not-loaded",
                "certificate authority is not loaded",
            ),
            Error::Domain(_) => ErrorResponse::new("user-domain", self),
            Error::Signing(_) => {
                ErrorResponse::new("sys-signing", "could not sign certificate")
            }
            Error::Encoding(_) => ErrorResponse::new(
                "sys-encoding",
                "could not encode certificate material",
            ),
            Error::UnsupportedFormat(_) => {
                ErrorResponse::new("user-format", self)
            }
        }
    }
}

//------------ ErrorResponse -------------------------------------------------

/// An API error response.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorResponse {
    /// The error label.
    pub label: String,

    /// The error message.
    pub msg: String,

    /// Arguments with details about the error.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub args: HashMap<String, String>,
}

impl ErrorResponse {
    pub fn new(label: &str, msg: impl fmt::Display) -> Self {
        ErrorResponse {
            label: label.to_string(),
            msg: msg.to_string(),
            args: HashMap::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.args.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_cause(self, cause: impl fmt::Display) -> Self {
        self.with_arg("cause", cause)
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.msg)
    }
}

//------------ CertIoError ---------------------------------------------------

/// An I/O error with some context about what we were doing.
#[derive(Debug)]
pub struct CertIoError {
    context: String,
    cause: io::Error,
}

impl CertIoError {
    pub fn new(context: String, cause: io::Error) -> Self {
        CertIoError { context, cause }
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.cause.kind()
    }
}

impl fmt::Display for CertIoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.cause)
    }
}

impl std::error::Error for CertIoError {}

//------------ openssl helpers -----------------------------------------------

/// Shorthand for mapping an openssl error stack into a signing error.
pub fn signing_err(e: ErrorStack) -> Error {
    Error::signing(e)
}

/// Shorthand for mapping an openssl error stack into an encoding error.
pub fn encoding_err(e: ErrorStack) -> Error {
    Error::encoding(e)
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Error::domain("localhost").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::unsupported_format("image/png").status(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(
            Error::validation("no certificate").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::signing("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn config_error_response_hides_paths() {
        let err = Error::config("Could not open: '/etc/secret/ca.key'");
        let response = err.to_error_response();
        assert_eq!(response.label, "sys-config");
        assert!(!response.msg.contains("/etc/secret"));
        assert!(err.to_string().contains("/etc/secret"));
    }

    #[test]
    fn domain_error_response_names_domain() {
        let response = Error::domain("localhost").to_error_response();
        assert_eq!(response.label, "user-domain");
        assert!(response.msg.contains("'localhost'"));
        assert!(response.args.is_empty());
    }

    #[test]
    fn error_response_json_skips_empty_args() {
        let json =
            serde_json::to_string(&ErrorResponse::new("x", "y")).unwrap();
        assert_eq!(json, r#"{"label":"x","msg":"y"}"#);

        let json = serde_json::to_string(
            &ErrorResponse::new("x", "y").with_cause("z"),
        )
        .unwrap();
        assert_eq!(json, r#"{"label":"x","msg":"y","args":{"cause":"z"}}"#);
    }
}
