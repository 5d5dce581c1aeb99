//! A client for the certmint HTTP API.

use std::fmt;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Response, StatusCode};
use url::Url;

use crate::commons::error::ErrorResponse;
use crate::constants::{
    CERTMINT_CLIENT_USER_AGENT, HTTP_CLIENT_TIMEOUT_SECS,
};
use crate::engine::bundle::CertificateResponse;

const JSON_CONTENT: &str = "application/json";

/// Characters escaped in the domain path segment.
const DOMAIN_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

//------------ CertmintClient ------------------------------------------------

/// Talks to a running certmint server.
#[derive(Clone, Debug)]
pub struct CertmintClient {
    base: Url,
    client: reqwest::Client,
}

impl CertmintClient {
    /// Creates a client for the server at `base_uri`.
    ///
    /// The base may carry a path, e.g. when the server sits behind a
    /// proxy. All endpoints are resolved relative to it.
    pub fn new(base_uri: &str) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_uri)
            .map_err(|e| ClientError::request_build(base_uri, e))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(HTTP_CLIENT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::request_build(base_uri, e))?;

        Ok(CertmintClient { base, client })
    }

    pub fn base_uri(&self) -> &Url {
        &self.base
    }

    /// Asks the server to issue a certificate for `domain`.
    pub async fn request_certificate(
        &self,
        domain: &str,
        client_auth: bool,
    ) -> Result<CertificateResponse, ClientError> {
        let path = format!(
            "newcert/{}",
            utf8_percent_encode(domain, DOMAIN_SEGMENT)
        );
        let mut uri = self.resolve(&path)?;
        if client_auth {
            uri.set_query(Some("client=true"));
        }

        let res = self.get(&uri, Some(JSON_CONTENT)).await?;
        process_json_response(uri.as_str(), res).await
    }

    /// Returns the PEM encoded certificate of the server's CA.
    pub async fn ca_certificate(&self) -> Result<String, ClientError> {
        let uri = self.resolve("ca")?;
        let res = self.get(&uri, None).await?;
        text_response(uri.as_str(), res).await
    }

    /// Checks that the server answers its health check.
    pub async fn health(&self) -> Result<(), ClientError> {
        let uri = self.resolve("health")?;
        let res = self.get(&uri, None).await?;
        text_response(uri.as_str(), res).await.map(|_| ())
    }

    fn resolve(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|e| ClientError::request_build(self.base.as_str(), e))
    }

    async fn get(
        &self,
        uri: &Url,
        accept: Option<&'static str>,
    ) -> Result<Response, ClientError> {
        self.client
            .get(uri.clone())
            .headers(headers(accept))
            .send()
            .await
            .map_err(|e| ClientError::execute(uri.as_str(), e))
    }
}

fn headers(accept: Option<&'static str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(CERTMINT_CLIENT_USER_AGENT),
    );
    if let Some(accept) = accept {
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
    }
    headers
}

async fn process_json_response(
    uri: &str,
    res: Response,
) -> Result<CertificateResponse, ClientError> {
    let text = text_response(uri, res).await?;
    serde_json::from_str(&text).map_err(|e| ClientError::response(uri, e))
}

async fn text_response(uri: &str, res: Response) -> Result<String, ClientError> {
    match res.status() {
        StatusCode::OK => {
            res.text().await.map_err(|e| ClientError::response(uri, e))
        }
        _ => Err(ClientError::from_res(uri, res).await),
    }
}

//------------ ClientError ---------------------------------------------------

type ErrorUri = String;
type ErrorMessage = String;

#[derive(Debug)]
pub enum ClientError {
    RequestBuild(ErrorUri, ErrorMessage),
    RequestExecute(ErrorUri, ErrorMessage),
    Response(ErrorUri, ErrorMessage),
    ErrorResponseWithBody(ErrorUri, StatusCode, String),
    ErrorResponseWithJson(ErrorUri, StatusCode, ErrorResponse),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientError::RequestBuild(uri, msg) => {
                write!(f, "Issue creating request for URI: {uri}, error: {msg}")
            }
            ClientError::RequestExecute(uri, msg) => {
                write!(f, "Issue accessing URI: {uri}, error: {msg}")
            }
            ClientError::Response(uri, msg) => write!(
                f,
                "Issue processing response from URI: {uri}, error: {msg}"
            ),
            ClientError::ErrorResponseWithBody(uri, code, e) => write!(
                f,
                "Error response from URI: {uri}, Status: {code}, Error: {e}"
            ),
            ClientError::ErrorResponseWithJson(uri, code, res) => write!(
                f,
                "Error response from URI: {uri}, Status: {code}, \
                 ErrorResponse: {res}"
            ),
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    pub fn request_build(uri: &str, msg: impl fmt::Display) -> Self {
        ClientError::RequestBuild(uri.to_string(), msg.to_string())
    }

    pub fn execute(uri: &str, msg: impl fmt::Display) -> Self {
        ClientError::RequestExecute(uri.to_string(), msg.to_string())
    }

    pub fn response(uri: &str, msg: impl fmt::Display) -> Self {
        ClientError::Response(uri.to_string(), msg.to_string())
    }

    /// The HTTP status of an error response, if the server sent one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::ErrorResponseWithBody(_, status, _)
            | ClientError::ErrorResponseWithJson(_, status, _) => Some(*status),
            _ => None,
        }
    }

    /// The error label the server reported, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            ClientError::ErrorResponseWithJson(_, _, res) => Some(&res.label),
            _ => None,
        }
    }

    async fn from_res(uri: &str, res: Response) -> ClientError {
        let status = res.status();
        match res.text().await {
            Ok(body) if !body.is_empty() => {
                match serde_json::from_str::<ErrorResponse>(&body) {
                    Ok(res) => ClientError::ErrorResponseWithJson(
                        uri.to_string(),
                        status,
                        res,
                    ),
                    Err(_) => ClientError::ErrorResponseWithBody(
                        uri.to_string(),
                        status,
                        body,
                    ),
                }
            }
            _ => ClientError::response(
                uri,
                format!("unexpected status code {status}"),
            ),
        }
    }
}

//------------ Tests ---------------------------------------------------------
