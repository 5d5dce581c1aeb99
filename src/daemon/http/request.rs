//! HTTP requests.

use std::borrow::Cow;

use hyper::header::ACCEPT;
use hyper::{Method, Uri};
use percent_encoding::percent_decode_str;

use crate::constants::{CLIENT_AUTH_PARAM, NEWCERT_PATH_PREFIX};

use super::response::HttpResponse;

//------------ HyperRequest --------------------------------------------------

/// A type alias for the request we receive from Hyper.
pub type HyperRequest = hyper::Request<hyper::body::Incoming>;

//------------ Request -------------------------------------------------------

/// The parts of a request that matter for dispatching.
///
/// None of the endpoints read a request body, so the body is left behind.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    accept: Option<String>,
}

impl Request {
    pub fn from_hyper<B>(request: &hyper::Request<B>) -> Self {
        Request {
            method: request.method().clone(),
            uri: request.uri().clone(),
            accept: request
                .headers()
                .get(ACCEPT)
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the raw request path.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Checks whether the request is a GET or returns an error response.
    pub fn check_get(&self) -> Result<(), HttpResponse> {
        match self.method {
            Method::GET => Ok(()),
            _ => Err(HttpResponse::method_not_allowed()),
        }
    }

    /// Returns the value of the Accept header.
    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// Returns the percent-decoded domain of an issuance request.
    ///
    /// The domain is everything after the path prefix, so it may be empty
    /// or contain slashes. Judging it is left to the engine.
    pub fn newcert_domain(&self) -> Option<Cow<'_, str>> {
        self.path()
            .strip_prefix(NEWCERT_PATH_PREFIX)
            .map(|domain| percent_decode_str(domain).decode_utf8_lossy())
    }

    /// Returns whether the client asked for a client auth certificate.
    ///
    /// Accepts `client=true` and `client=1`.
    pub fn wants_client_auth(&self) -> bool {
        self.uri
            .query()
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes()).any(|(key, value)| {
                    key == CLIENT_AUTH_PARAM && (value == "true" || value == "1")
                })
            })
            .unwrap_or(false)
    }
}

//------------ Tests ---------------------------------------------------------
