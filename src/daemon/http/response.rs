//! HTTP responses.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use hyper::StatusCode;
use log::error;
use serde::Serialize;

use crate::commons::error::{Error, ErrorResponse};

//----------- ContentType ----------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Json,
    Pem,
    Text,
    Xml,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Pem => "application/x-pem-file",
            ContentType::Text => "text/plain",
            ContentType::Xml => "application/xml",
        }
    }
}

//------------ HyperResponse -------------------------------------------------

pub type HyperResponseBody = Full<Bytes>;
pub type HyperResponse = hyper::Response<HyperResponseBody>;

//----------- Response -------------------------------------------------------

struct Response {
    status: StatusCode,
    content_type: ContentType,
    body: Bytes,
    cause: Option<Error>,
}

impl Response {
    fn new(status: StatusCode) -> Self {
        Response {
            status,
            content_type: ContentType::Text,
            body: Bytes::default(),
            cause: None,
        }
    }

    fn finalize(self) -> HttpResponse {
        let mut response = hyper::Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static(self.content_type.as_str()),
        );

        HttpResponse {
            response,
            cause: self.cause,
        }
    }
}

//------------ HttpResponse --------------------------------------------------

#[derive(Debug)]
pub struct HttpResponse {
    response: HyperResponse,
    cause: Option<Error>,
}

impl HttpResponse {
    pub fn into_hyper(self) -> HyperResponse {
        self.response
    }

    /// The error that led to this response, if any.
    ///
    /// Useful for logging: the body shown to the client may leave out
    /// details.
    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_ref()
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    pub fn body(&self) -> &HyperResponseBody {
        self.response.body()
    }

    pub fn ok_with_body(content_type: ContentType, body: impl Into<Bytes>) -> Self {
        Response {
            status: StatusCode::OK,
            content_type,
            body: body.into(),
            cause: None,
        }
        .finalize()
    }

    pub fn json<O: Serialize>(object: &O) -> Self {
        match serde_json::to_string(object) {
            Ok(json) => Self::ok_with_body(ContentType::Json, json),
            Err(e) => Self::response_from_error(
                Error::encoding(format!("cannot serialize JSON: {e}")),
                false,
            ),
        }
    }

    pub fn text(body: impl Into<Bytes>) -> Self {
        Self::ok_with_body(ContentType::Text, body)
    }

    pub fn xml(body: impl Into<Bytes>) -> Self {
        Self::ok_with_body(ContentType::Xml, body)
    }

    pub fn pem(body: impl Into<Bytes>) -> Self {
        Self::ok_with_body(ContentType::Pem, body)
    }

    /// Turns an error into a JSON error response.
    ///
    /// In development mode the full error is added to the response as the
    /// "cause" argument.
    pub fn response_from_error(error: Error, development: bool) -> Self {
        let status = error.status();
        let mut response = error.to_error_response();
        if development {
            response = response.with_cause(&error);
        }
        Self::error_response(status, &response, Some(error))
    }

    fn error_response(
        status: StatusCode,
        response: &ErrorResponse,
        cause: Option<Error>,
    ) -> Self {
        let body = match serde_json::to_string(response) {
            Ok(body) => body,
            Err(e) => {
                error!("Cannot serialize error response: {e}");
                String::new()
            }
        };
        Response {
            status,
            content_type: ContentType::Json,
            body: body.into(),
            cause,
        }
        .finalize()
    }

    pub fn ok() -> Self {
        Self::text("OK")
    }

    pub fn not_found() -> Self {
        Response::new(StatusCode::NOT_FOUND).finalize()
    }

    pub fn method_not_allowed() -> Self {
        Response::new(StatusCode::METHOD_NOT_ALLOWED).finalize()
    }
}

//------------ Tests ---------------------------------------------------------
