//! Negotiation and rendering of the certificate response format.

use crate::commons::CertResult;
use crate::commons::error::Error;
use crate::engine::bundle::CertificateResponse;

use super::response::HttpResponse;

//------------ ResponseFormat ------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResponseFormat {
    Plain,
    Json,
    Xml,
}

/// Media types we can answer with, and the format each maps to.
const MEDIA_TYPES: &[(&str, ResponseFormat)] = &[
    ("text/plain", ResponseFormat::Plain),
    ("text/html", ResponseFormat::Plain),
    ("application/json", ResponseFormat::Json),
    ("*/*", ResponseFormat::Json),
    ("text/xml", ResponseFormat::Xml),
    ("application/xml", ResponseFormat::Xml),
];

impl ResponseFormat {
    /// Picks the format for the value of an Accept header.
    ///
    /// Only the first media type of the header counts, its parameters are
    /// ignored. Without a header the answer is JSON.
    pub fn negotiate(accept: Option<&str>) -> CertResult<Self> {
        let media_type = accept
            .and_then(|accept| accept.split(',').next())
            .and_then(|first| first.split(';').next())
            .map(str::trim)
            .unwrap_or_default();

        if media_type.is_empty() {
            return Ok(ResponseFormat::Json);
        }

        MEDIA_TYPES
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(media_type))
            .map(|(_, format)| *format)
            .ok_or_else(|| Error::unsupported_format(media_type))
    }

    pub fn render(self, response: &CertificateResponse) -> CertResult<HttpResponse> {
        match self {
            ResponseFormat::Plain => Ok(HttpResponse::text(response.to_plain())),
            ResponseFormat::Json => Ok(HttpResponse::json(response)),
            ResponseFormat::Xml => {
                let xml = quick_xml::se::to_string(response)
                    .map_err(|e| Error::encoding(format!("cannot serialize XML: {e}")))?;
                Ok(HttpResponse::xml(xml))
            }
        }
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use hyper::header::CONTENT_TYPE;

    use super::*;

    #[test]
    fn negotiate() {
        use ResponseFormat::*;

        assert_eq!(ResponseFormat::negotiate(None).unwrap(), Json);
        assert_eq!(ResponseFormat::negotiate(Some("")).unwrap(), Json);
        assert_eq!(ResponseFormat::negotiate(Some("*/*")).unwrap(), Json);
        assert_eq!(ResponseFormat::negotiate(Some("application/json")).unwrap(), Json);
        assert_eq!(ResponseFormat::negotiate(Some("text/plain")).unwrap(), Plain);
        assert_eq!(
            ResponseFormat::negotiate(Some("text/html,application/xhtml+xml")).unwrap(),
            Plain
        );
        assert_eq!(ResponseFormat::negotiate(Some("text/xml")).unwrap(), Xml);
        assert_eq!(
            ResponseFormat::negotiate(Some("application/xml; charset=utf-8")).unwrap(),
            Xml
        );
        assert_eq!(ResponseFormat::negotiate(Some("Application/JSON")).unwrap(), Json);
    }

    #[test]
    fn negotiate_looks_at_first_entry_only() {
        let res = ResponseFormat::negotiate(Some("image/png, application/json"));
        assert!(matches!(res, Err(Error::UnsupportedFormat(m)) if m == "image/png"));
    }

    fn response() -> CertificateResponse {
        CertificateResponse {
            certificate_pem: "CERT\n".into(),
            certificate_key: "KEY\n".into(),
            certificate_authority_pem: "CA\n".into(),
        }
    }

    #[test]
    fn render_content_types() {
        let res = ResponseFormat::Plain.render(&response()).unwrap();
        assert_eq!(res.headers()[CONTENT_TYPE], "text/plain");

        let res = ResponseFormat::Json.render(&response()).unwrap();
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");

        let res = ResponseFormat::Xml.render(&response()).unwrap();
        assert_eq!(res.headers()[CONTENT_TYPE], "application/xml");
    }

    #[test]
    fn xml_document() {
        let xml = quick_xml::se::to_string(&response()).unwrap();
        assert_eq!(
            xml,
            "<CertificateResponse>\
             <crt_file>CERT\n</crt_file>\
             <key_file>KEY\n</key_file>\
             <registry_ca>CA\n</registry_ca>\
             </CertificateResponse>"
        );
    }
}
