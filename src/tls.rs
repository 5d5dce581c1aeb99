//! rustls configurations for mutual TLS derived from issued bundles.
//!
//! Everything here works from the three PEM strings of a
//! [`PemBundle`], so a bundle fresh out of the engine and one received
//! over HTTP can be used in the same way.

use std::sync::Arc;

use openssl::pkey::PKey;
use openssl::x509::X509;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{ClientConfig, KeyLogFile, RootCertStore, ServerConfig};

use crate::commons::CertResult;
use crate::commons::error::Error;
use crate::constants::SSLKEYLOGFILE_ENV_VAR_NAME;
use crate::engine::bundle::PemBundle;

//------------ TlsKeyPair ----------------------------------------------------

/// A certificate chain and its private key in the form rustls wants them.
#[derive(Debug)]
pub struct TlsKeyPair {
    pub certs: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

/// Re-parses the PEM certificate and key of `bundle`.
///
/// Fails if either does not parse or if the key does not belong to the
/// certificate.
pub fn to_key_pair(bundle: &impl PemBundle) -> CertResult<TlsKeyPair> {
    check_key_matches(bundle)?;

    let certs = read_certs(bundle.certificate_pem(), "certificate")?;
    let key = read_key(bundle.private_key_pem())?;
    Ok(TlsKeyPair { certs, key })
}

/// Returns a client config presenting the bundle's certificate and
/// trusting only the bundle's CA.
pub fn client_tls_config(bundle: &impl PemBundle) -> CertResult<ClientConfig> {
    let pair = to_key_pair(bundle)?;
    let roots = root_store(bundle)?;

    let mut config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(pair.certs, pair.key)
        .map_err(|e| Error::encoding(format!("TLS client configuration: {e}")))?;

    enable_key_log(&mut config.key_log);
    Ok(config)
}

/// Returns a server config presenting the bundle's certificate.
///
/// With `require_client_cert` clients must present a certificate issued by
/// the bundle's CA.
pub fn server_tls_config(
    bundle: &impl PemBundle,
    require_client_cert: bool,
) -> CertResult<ServerConfig> {
    let pair = to_key_pair(bundle)?;

    let builder = ServerConfig::builder();
    let builder = if require_client_cert {
        let roots = Arc::new(root_store(bundle)?);
        let verifier = WebPkiClientVerifier::builder(roots)
            .build()
            .map_err(|e| Error::encoding(format!("TLS client verifier: {e}")))?;
        builder.with_client_cert_verifier(verifier)
    } else {
        builder.with_no_client_auth()
    };

    let mut config = builder
        .with_single_cert(pair.certs, pair.key)
        .map_err(|e| Error::encoding(format!("TLS server configuration: {e}")))?;

    enable_key_log(&mut config.key_log);
    Ok(config)
}

// See: https://wiki.wireshark.org/TLS#tls-decryption
fn enable_key_log(key_log: &mut Arc<dyn tokio_rustls::rustls::KeyLog>) {
    if std::env::var(SSLKEYLOGFILE_ENV_VAR_NAME).is_ok() {
        *key_log = Arc::new(KeyLogFile::new());
    }
}

fn check_key_matches(bundle: &impl PemBundle) -> CertResult<()> {
    let cert = X509::from_pem(bundle.certificate_pem().as_bytes())
        .map_err(|e| Error::encoding(format!("certificate: {e}")))?;
    let key = PKey::private_key_from_pem(bundle.private_key_pem().as_bytes())
        .map_err(|e| Error::encoding(format!("private key: {e}")))?;
    let public_key = cert
        .public_key()
        .map_err(|e| Error::encoding(format!("certificate: {e}")))?;

    if public_key.public_eq(&key) {
        Ok(())
    } else {
        Err(Error::encoding("private key does not match certificate"))
    }
}

fn root_store(bundle: &impl PemBundle) -> CertResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in read_certs(bundle.ca_certificate_pem(), "CA certificate")? {
        roots
            .add(cert)
            .map_err(|e| Error::encoding(format!("CA certificate: {e}")))?;
    }
    Ok(roots)
}

fn read_certs(pem: &str, what: &str) -> CertResult<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::encoding(format!("{what}: {e}")))?;

    if certs.is_empty() {
        Err(Error::encoding(format!("{what}: no certificate found")))
    } else {
        Ok(certs)
    }
}

/// Reads the one private key from the PEM text.
///
/// The key may be a PKCS#1 RSA private key, a PKCS#8 private key, or a
/// SEC1 encoded EC private key. All other PEM items are ignored.
fn read_key(pem: &str) -> CertResult<PrivateKeyDer<'static>> {
    use rustls_pemfile::Item::*;

    let mut reader = pem.as_bytes();
    let mut key = None;

    while let Some(item) = rustls_pemfile::read_one(&mut reader).transpose() {
        let item = item.map_err(|e| Error::encoding(format!("private key: {e}")))?;

        let der = match item {
            Pkcs1Key(der) => der.into(),
            Pkcs8Key(der) => der.into(),
            Sec1Key(der) => der.into(),
            _ => continue,
        };
        if key.is_some() {
            return Err(Error::encoding("private key: multiple keys found"));
        }
        key = Some(der);
    }

    key.ok_or_else(|| Error::encoding("private key: no usable key found"))
}

//------------ Tests ---------------------------------------------------------
