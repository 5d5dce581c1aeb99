//! The description of a leaf certificate before it is signed.

use std::time::Duration;

use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::commons::CertResult;
use crate::commons::error::Error;

use super::context::IssuancePolicy;

/// Separates the labels of a domain name.
pub const LABEL_SEPARATOR: char = '.';

//------------ LeafRequest ---------------------------------------------------

/// A validated request for a leaf certificate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeafRequest {
    domain: String,
    client_auth: bool,
}

impl LeafRequest {
    /// Fails with a domain error unless `domain` has at least one dot.
    ///
    /// The domain ends up in IA5String DNS names, so it must be ASCII.
    /// Internationalized names have to be given in their punycode form.
    pub fn new(domain: &str, client_auth: bool) -> CertResult<Self> {
        if !domain.contains(LABEL_SEPARATOR) || !domain.is_ascii() {
            return Err(Error::domain(domain));
        }
        Ok(LeafRequest {
            domain: domain.to_string(),
            client_auth,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn client_auth(&self) -> bool {
        self.client_auth
    }
}

/// Returns the names covered by a certificate for `domain`, in order:
/// the domain itself, its wildcard and the label before the first dot.
///
/// For "sub.example.com" the last entry is "sub", not "sub.example".
pub fn subject_alt_names(domain: &str) -> Vec<String> {
    let first_label = domain
        .split_once(LABEL_SEPARATOR)
        .map_or(domain, |(first, _)| first);

    vec![
        domain.to_string(),
        format!("*.{domain}"),
        first_label.to_string(),
    ]
}

/// Returns a random serial number in [0, 2^128) from the OS generator.
pub fn random_serial() -> CertResult<u128> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::signing(format!("could not generate serial number: {e}")))?;
    Ok(u128::from_be_bytes(bytes))
}

//------------ SubjectName ---------------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubjectName {
    pub common_name: String,
    pub locality: String,
    pub province: String,
    pub country: String,
}

//------------ KeyUsage ------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyUsage {
    DigitalSignature,
    KeyEncipherment,
    /// Also known as content commitment.
    NonRepudiation,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExtendedKeyUsage {
    ClientAuth,
}

//------------ LeafTemplate --------------------------------------------------

/// Everything the signer needs to know about a leaf certificate.
///
/// The validity window is kept as a duration. The signer fixes NotBefore
/// at the time of signing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeafTemplate {
    pub serial: u128,
    pub subject: SubjectName,
    pub dns_names: Vec<String>,
    pub key_usage: Vec<KeyUsage>,
    pub extended_key_usage: Vec<ExtendedKeyUsage>,
    pub validity: Duration,
    pub is_ca: bool,
}

impl LeafTemplate {
    pub fn build(request: &LeafRequest, policy: &IssuancePolicy) -> CertResult<Self> {
        let domain = request.domain();

        let subject = SubjectName {
            common_name: domain.to_string(),
            locality: policy.subject.locality.clone(),
            province: policy.subject.province.clone(),
            country: policy.subject.country.clone(),
        };

        let mut extended_key_usage = Vec::new();
        if request.client_auth() {
            extended_key_usage.push(ExtendedKeyUsage::ClientAuth);
        }

        Ok(LeafTemplate {
            serial: random_serial()?,
            subject,
            dns_names: subject_alt_names(domain),
            key_usage: vec![
                KeyUsage::KeyEncipherment,
                KeyUsage::DigitalSignature,
                KeyUsage::NonRepudiation,
            ],
            extended_key_usage,
            validity: policy.validity,
            is_ca: false,
        })
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::SubjectDefaults;

    #[test]
    fn domain_needs_a_dot() {
        assert!(matches!(LeafRequest::new("localhost", false), Err(Error::Domain(_))));
        assert!(matches!(LeafRequest::new("", true), Err(Error::Domain(_))));

        let request = LeafRequest::new("example.com", true).unwrap();
        assert_eq!(request.domain(), "example.com");
        assert!(request.client_auth());
    }

    #[test]
    fn domain_must_be_ascii() {
        assert!(matches!(LeafRequest::new("ünï.example", false), Err(Error::Domain(_))));
        assert!(matches!(LeafRequest::new("example.côm", false), Err(Error::Domain(_))));
        assert!(LeafRequest::new("xn--n-1ga3b.example", false).is_ok());
    }

    #[test]
    fn san_order() {
        assert_eq!(
            subject_alt_names("example.com"),
            vec!["example.com", "*.example.com", "example"]
        );
        assert_eq!(
            subject_alt_names("sub.example.com"),
            vec!["sub.example.com", "*.sub.example.com", "sub"]
        );
    }

    #[test]
    fn san_with_leading_dot_has_empty_short_name() {
        assert_eq!(
            subject_alt_names(".example"),
            vec![".example", "*..example", ""]
        );
    }

    #[test]
    fn serials_differ() {
        assert_ne!(random_serial().unwrap(), random_serial().unwrap());
    }

    #[test]
    fn build_template() {
        let policy = IssuancePolicy::default();
        let request = LeafRequest::new("host.example.org", false).unwrap();
        let template = LeafTemplate::build(&request, &policy).unwrap();

        assert_eq!(template.subject.common_name, "host.example.org");
        assert_eq!(template.subject.locality, "Saint Louis");
        assert_eq!(template.subject.province, "Missouri");
        assert_eq!(template.subject.country, "US");
        assert_eq!(template.dns_names[2], "host");
        assert_eq!(template.key_usage.len(), 3);
        assert!(template.key_usage.contains(&KeyUsage::NonRepudiation));
        assert!(template.extended_key_usage.is_empty());
        assert_eq!(template.validity, policy.validity);
        assert!(!template.is_ca);
    }

    #[test]
    fn build_client_template_with_custom_subject() {
        let policy = IssuancePolicy {
            subject: SubjectDefaults {
                locality: "Amsterdam".into(),
                province: "Noord-Holland".into(),
                country: "NL".into(),
            },
            ..Default::default()
        }
        .with_validity_days(7);
        let request = LeafRequest::new("example.com", true).unwrap();
        let template = LeafTemplate::build(&request, &policy).unwrap();

        assert_eq!(template.subject.country, "NL");
        assert_eq!(template.extended_key_usage, vec![ExtendedKeyUsage::ClientAuth]);
        assert_eq!(template.validity, Duration::from_secs(7 * 24 * 3600));
    }
}
