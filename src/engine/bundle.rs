//! Issued certificates and their PEM packaging.

use std::io;

use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use pem::{EncodeConfig, LineEnding, Pem};
use serde::{Deserialize, Serialize};

use crate::commons::CertResult;
use crate::commons::error::encoding_err;

use super::context::SigningMaterial;

//------------ PEM -----------------------------------------------------------

/// The PEM label of X.509 certificates.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// The PEM label of PKCS#1 RSA private keys.
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";

/// The PEM label of PKCS#8 private keys.
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// Wraps DER data into a PEM block with `\n` line endings.
pub fn to_pem(label: &str, der: &[u8]) -> String {
    pem::encode_config(
        &Pem::new(label, der),
        EncodeConfig::new().set_line_ending(LineEnding::LF),
    )
}

//------------ PemBundle -----------------------------------------------------

/// Access to the three PEM texts that make up an issued bundle.
///
/// Implemented by both the engine's [`IssuedCertificateBundle`] and the
/// [`CertificateResponse`] a client receives over HTTP, so TLS
/// configurations can be derived from either.
pub trait PemBundle {
    fn certificate_pem(&self) -> &str;
    fn private_key_pem(&self) -> &str;
    fn ca_certificate_pem(&self) -> &str;
}

//------------ IssuedCertificateBundle ---------------------------------------

/// A freshly issued leaf certificate with its key and the CA certificate.
pub struct IssuedCertificateBundle {
    certificate: X509,
    private_key: PKey<Private>,
    certificate_pem: String,
    private_key_pem: String,
    ca_certificate_pem: String,
}

impl IssuedCertificateBundle {
    /// Wraps the signed certificate, its PKCS#1 key and the CA certificate
    /// into PEM.
    pub fn assemble(
        certificate: X509,
        private_key: PKey<Private>,
        ca: &SigningMaterial,
    ) -> CertResult<Self> {
        let cert_der = certificate.to_der().map_err(encoding_err)?;
        let key_der = private_key
            .rsa()
            .and_then(|rsa| rsa.private_key_to_der())
            .map_err(encoding_err)?;

        Ok(IssuedCertificateBundle {
            certificate_pem: to_pem(CERTIFICATE_LABEL, &cert_der),
            private_key_pem: to_pem(RSA_PRIVATE_KEY_LABEL, &key_der),
            ca_certificate_pem: ca.certificate_pem().to_string(),
            certificate,
            private_key,
        })
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    /// Returns the DNS names of the subject alternative name extension.
    pub fn subject_alt_names(&self) -> Vec<String> {
        self.certificate
            .subject_alt_names()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| name.dnsname().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the serial number as upper case hex.
    pub fn serial_hex(&self) -> CertResult<String> {
        let serial = self
            .certificate
            .serial_number()
            .to_bn()
            .and_then(|bn| bn.to_hex_str().map(|hex| hex.to_string()))
            .map_err(encoding_err)?;
        Ok(serial)
    }

    pub fn to_response(&self) -> CertificateResponse {
        CertificateResponse {
            certificate_pem: self.certificate_pem.clone(),
            certificate_key: self.private_key_pem.clone(),
            certificate_authority_pem: self.ca_certificate_pem.clone(),
        }
    }

    pub fn into_response(self) -> CertificateResponse {
        CertificateResponse {
            certificate_pem: self.certificate_pem,
            certificate_key: self.private_key_pem,
            certificate_authority_pem: self.ca_certificate_pem,
        }
    }
}

impl PemBundle for IssuedCertificateBundle {
    fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    fn ca_certificate_pem(&self) -> &str {
        &self.ca_certificate_pem
    }
}

//------------ CertificateResponse -------------------------------------------

/// The result of a certificate request as it goes over the wire.
///
/// The field names are part of the contract with existing consumers.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename = "CertificateResponse")]
pub struct CertificateResponse {
    #[serde(rename = "crt_file")]
    pub certificate_pem: String,

    #[serde(rename = "key_file")]
    pub certificate_key: String,

    #[serde(rename = "registry_ca")]
    pub certificate_authority_pem: String,
}

impl CertificateResponse {
    /// Writes the certificate, key and CA as readable text.
    pub fn write_plain<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(self.to_plain().as_bytes())
    }

    pub fn to_plain(&self) -> String {
        let mut text = String::from("# Certificate Information\n\n");

        text.push_str("\n## CertificatePem\n");
        text.push_str(&self.certificate_pem);

        text.push_str("\n## CertificateKey\n");
        text.push_str(&self.certificate_key);

        text.push_str("\n## CertificateAuthorityPem\n");
        text.push_str(&self.certificate_authority_pem);

        text
    }
}

impl PemBundle for CertificateResponse {
    fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    fn private_key_pem(&self) -> &str {
        &self.certificate_key
    }

    fn ca_certificate_pem(&self) -> &str {
        &self.certificate_authority_pem
    }
}

//------------ Tests ---------------------------------------------------------
