//! Routing of HTTP requests to the issuer.

use std::convert::Infallible;

use log::{error, info, warn};

use crate::commons::error::Error;
use crate::constants::{CA_CERT_PATH, NEWCERT_PATH_PREFIX};
use crate::engine::Issuer;

use super::format::ResponseFormat;
use super::request::Request;
use super::response::{HttpResponse, HyperResponse};

//------------ HttpServer ----------------------------------------------------

/// Answers HTTP requests on behalf of an [`Issuer`].
pub struct HttpServer {
    issuer: Issuer,

    /// Whether to include internal error causes in responses.
    development: bool,
}

impl HttpServer {
    pub fn new(issuer: Issuer, development: bool) -> Self {
        HttpServer {
            issuer,
            development,
        }
    }

    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    /// Processes a single request and logs the outcome.
    ///
    /// Never fails: all errors end up as error responses.
    pub async fn process_request<B>(
        &self,
        request: hyper::Request<B>,
    ) -> Result<HyperResponse, Infallible> {
        let request = Request::from_hyper(&request);
        let response = self.dispatch(&request).await;
        log_request(&request, &response);
        Ok(response.into_hyper())
    }

    async fn dispatch(&self, request: &Request) -> HttpResponse {
        let path = request.path();
        if path == "/" || path == "/health" {
            health(request)
        } else if path == CA_CERT_PATH {
            self.ca_certificate(request)
        } else if path.starts_with(NEWCERT_PATH_PREFIX) {
            self.new_certificate(request).await
        } else {
            HttpResponse::not_found()
        }
    }

    //------------ /ca -------------------------------------------------------

    fn ca_certificate(&self, request: &Request) -> HttpResponse {
        if let Err(res) = request.check_get() {
            return res;
        }
        match self.issuer.context().ca_certificate_pem() {
            Ok(pem) => HttpResponse::pem(pem.to_string()),
            Err(e) => self.error(e),
        }
    }

    //------------ /newcert/<domain> -----------------------------------------

    async fn new_certificate(&self, request: &Request) -> HttpResponse {
        if let Err(res) = request.check_get() {
            return res;
        }

        // Refuse unsupported formats before spending a key on the request.
        let format = match ResponseFormat::negotiate(request.accept()) {
            Ok(format) => format,
            Err(e) => return self.error(e),
        };
        let domain = request.newcert_domain().unwrap_or_default();

        let bundle = match self
            .issuer
            .generate_certificate(&domain, request.wants_client_auth())
            .await
        {
            Ok(bundle) => bundle,
            Err(e) => return self.error(e),
        };

        match format.render(&bundle.into_response()) {
            Ok(res) => res,
            Err(e) => self.error(e),
        }
    }

    fn error(&self, error: Error) -> HttpResponse {
        HttpResponse::response_from_error(error, self.development)
    }
}

//------------ / and /health -------------------------------------------------

fn health(request: &Request) -> HttpResponse {
    match request.check_get() {
        Ok(()) => HttpResponse::ok(),
        Err(res) => res,
    }
}

fn log_request(request: &Request, response: &HttpResponse) {
    info!(
        "{} {} {}",
        request.method(),
        request.path(),
        response.status().as_u16()
    );
    if let Some(cause) = response.cause() {
        if response.status().is_server_error() {
            error!("{} {} failed: {}", request.method(), request.path(), cause);
        } else {
            warn!("{} {} failed: {}", request.method(), request.path(), cause);
        }
    }
}

//------------ Tests ---------------------------------------------------------
