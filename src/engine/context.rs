//! The certificate authority context.
//!
//! A [`CaContext`] starts out unloaded and becomes loaded once the signing
//! certificate and private key have been read. There is no way back: once
//! loaded the context is only ever read, typically behind an `Arc` shared
//! by all issuance tasks.

use std::path::Path;
use std::time::Duration;

use log::info;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509Ref};

use crate::commons::CertResult;
use crate::commons::error::Error;
use crate::commons::file;
use crate::constants::{
    DEFAULT_KEY_BITS, DEFAULT_SUBJECT_COUNTRY, DEFAULT_SUBJECT_LOCALITY,
    DEFAULT_SUBJECT_PROVINCE, DEFAULT_VALIDITY_DAYS,
};
use crate::engine::bundle::{
    CERTIFICATE_LABEL, PRIVATE_KEY_LABEL, RSA_PRIVATE_KEY_LABEL, to_pem,
};

//------------ SubjectDefaults -----------------------------------------------

/// Subject attributes added to every issued certificate besides the CN.
///
/// Empty values are left out of the subject name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubjectDefaults {
    pub locality: String,
    pub province: String,
    pub country: String,
}

impl Default for SubjectDefaults {
    fn default() -> Self {
        SubjectDefaults {
            locality: DEFAULT_SUBJECT_LOCALITY.to_string(),
            province: DEFAULT_SUBJECT_PROVINCE.to_string(),
            country: DEFAULT_SUBJECT_COUNTRY.to_string(),
        }
    }
}

//------------ IssuancePolicy ------------------------------------------------

/// How leaf certificates are issued.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IssuancePolicy {
    /// Size of the RSA keys generated for leaf certificates.
    pub key_bits: u32,

    /// Time between NotBefore and NotAfter.
    pub validity: Duration,

    pub subject: SubjectDefaults,
}

impl IssuancePolicy {
    pub fn with_validity_days(mut self, days: u32) -> Self {
        self.validity = days_to_duration(days);
        self
    }
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        IssuancePolicy {
            key_bits: DEFAULT_KEY_BITS,
            validity: days_to_duration(DEFAULT_VALIDITY_DAYS),
            subject: SubjectDefaults::default(),
        }
    }
}

pub fn days_to_duration(days: u32) -> Duration {
    Duration::from_secs(u64::from(days) * 24 * 60 * 60)
}

//------------ SigningMaterial -----------------------------------------------

/// The CA certificate and the key that signs leaf certificates.
pub struct SigningMaterial {
    certificate: X509,
    private_key: PKey<Private>,

    /// The CA certificate re-encoded from its DER form.
    certificate_pem: String,
}

impl SigningMaterial {
    fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> CertResult<Self> {
        let cert_block = pem::parse(cert_pem)
            .map_err(|e| Error::config(format!("CA certificate: {e}")))?;
        if cert_block.tag() != CERTIFICATE_LABEL {
            return Err(Error::config(format!(
                "CA certificate: unexpected PEM block '{}'",
                cert_block.tag()
            )));
        }
        let certificate = X509::from_der(cert_block.contents())
            .map_err(|e| Error::config(format!("CA certificate: {e}")))?;

        let key_block = pem::parse(key_pem)
            .map_err(|e| Error::config(format!("CA private key: {e}")))?;
        let private_key = match key_block.tag() {
            RSA_PRIVATE_KEY_LABEL => Rsa::private_key_from_der(key_block.contents())
                .and_then(PKey::from_rsa),
            PRIVATE_KEY_LABEL => PKey::private_key_from_der(key_block.contents()),
            other => {
                return Err(Error::config(format!(
                    "CA private key: unsupported PEM block '{other}'"
                )));
            }
        }
        .map_err(|e| Error::config(format!("CA private key: {e}")))?;

        let public_key = certificate
            .public_key()
            .map_err(|e| Error::config(format!("CA certificate: {e}")))?;
        if !public_key.public_eq(&private_key) {
            return Err(Error::config(
                "CA private key does not match CA certificate",
            ));
        }

        let der = certificate
            .to_der()
            .map_err(|e| Error::config(format!("CA certificate: {e}")))?;
        let certificate_pem = to_pem(CERTIFICATE_LABEL, &der);

        Ok(SigningMaterial {
            certificate,
            private_key,
            certificate_pem,
        })
    }

    pub fn certificate(&self) -> &X509Ref {
        &self.certificate
    }

    pub fn private_key(&self) -> &PKeyRef<Private> {
        &self.private_key
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }
}

//------------ CaContext -----------------------------------------------------

pub struct CaContext {
    signing: Option<SigningMaterial>,
    policy: IssuancePolicy,
}

impl CaContext {
    /// Creates an unloaded context.
    pub fn new(policy: IssuancePolicy) -> Self {
        CaContext {
            signing: None,
            policy,
        }
    }

    /// Creates a context and loads the CA material from the given files.
    pub fn create(
        policy: IssuancePolicy,
        cert_path: &Path,
        key_path: &Path,
    ) -> CertResult<Self> {
        let mut context = Self::new(policy);
        context.load(cert_path, key_path)?;
        Ok(context)
    }

    /// Reads the CA certificate and private key from PEM files.
    pub fn load(&mut self, cert_path: &Path, key_path: &Path) -> CertResult<()> {
        if self.is_loaded() {
            return Err(Error::config("CA context was already loaded"));
        }
        let cert_pem = file::read(cert_path)?;
        let key_pem = file::read(key_path)?;
        self.load_pem(&cert_pem, &key_pem).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!(
                "{msg} (certificate '{}', key '{}')",
                cert_path.display(),
                key_path.display()
            )),
            other => other,
        })?;

        info!(
            "Loaded CA certificate from '{}'",
            cert_path.to_string_lossy()
        );
        Ok(())
    }

    /// Loads the CA certificate and private key from PEM text.
    pub fn load_pem(&mut self, cert_pem: &[u8], key_pem: &[u8]) -> CertResult<()> {
        if self.is_loaded() {
            return Err(Error::config("CA context was already loaded"));
        }
        self.signing = Some(SigningMaterial::from_pem(cert_pem, key_pem)?);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.signing.is_some()
    }

    /// Returns the signing material if the context is loaded.
    pub fn validate(&self) -> CertResult<&SigningMaterial> {
        self.signing.as_ref().ok_or_else(|| {
            Error::validation("CA certificate and private key are not loaded")
        })
    }

    pub fn policy(&self) -> &IssuancePolicy {
        &self.policy
    }

    pub fn ca_certificate_pem(&self) -> CertResult<&str> {
        self.validate().map(SigningMaterial::certificate_pem)
    }
}

//------------ Tests ---------------------------------------------------------
