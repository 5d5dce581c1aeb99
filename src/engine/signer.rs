//! Turns a [`LeafTemplate`] into a certificate signed by the CA.

use std::time::{SystemTime, UNIX_EPOCH};

use openssl::asn1::{Asn1Time, Asn1Type};
use openssl::bn::BigNum;
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{HasPublic, PKeyRef};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage as EkuExtension,
    KeyUsage as KuExtension, SubjectAlternativeName, SubjectKeyIdentifier,
};
use openssl::x509::{X509, X509Builder, X509NameBuilder, X509Name};

use crate::commons::CertResult;
use crate::commons::error::{Error, signing_err};

use super::context::SigningMaterial;
use super::template::{ExtendedKeyUsage, KeyUsage, LeafTemplate, SubjectName};

/// Version field value for X.509 v3 (the field is zero based).
const X509_V3: i32 = 2;

/// Signs the template for `public_key` with the CA's key.
///
/// NotBefore is the current time, NotAfter lies the template's validity
/// after it.
pub fn sign<T: HasPublic>(
    template: &LeafTemplate,
    public_key: &PKeyRef<T>,
    ca: &SigningMaterial,
) -> CertResult<X509> {
    let not_before = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::signing(format!("system clock before epoch: {e}")))?
        .as_secs();
    let not_after = not_before
        .checked_add(template.validity.as_secs())
        .ok_or_else(|| Error::signing("validity period overflows"))?;

    let not_before = i64::try_from(not_before).map_err(Error::signing)?;
    let not_after = i64::try_from(not_after).map_err(Error::signing)?;

    build_certificate(template, public_key, ca, not_before, not_after).map_err(signing_err)
}

fn build_certificate<T: HasPublic>(
    template: &LeafTemplate,
    public_key: &PKeyRef<T>,
    ca: &SigningMaterial,
    not_before: i64,
    not_after: i64,
) -> Result<X509, ErrorStack> {
    let mut builder = X509Builder::new()?;
    builder.set_version(X509_V3)?;

    let serial = BigNum::from_slice(&template.serial.to_be_bytes())?.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;

    let subject = subject_name(&template.subject)?;
    builder.set_subject_name(&subject)?;
    builder.set_issuer_name(ca.certificate().subject_name())?;
    builder.set_pubkey(public_key)?;

    let not_before = Asn1Time::from_unix(not_before as _)?;
    let not_after = Asn1Time::from_unix(not_after as _)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;

    let mut basic_constraints = BasicConstraints::new();
    basic_constraints.critical();
    if template.is_ca {
        basic_constraints.ca();
    }
    builder.append_extension(basic_constraints.build()?)?;

    let mut key_usage = KuExtension::new();
    key_usage.critical();
    for usage in &template.key_usage {
        match usage {
            KeyUsage::DigitalSignature => key_usage.digital_signature(),
            KeyUsage::KeyEncipherment => key_usage.key_encipherment(),
            KeyUsage::NonRepudiation => key_usage.non_repudiation(),
        };
    }
    builder.append_extension(key_usage.build()?)?;

    if !template.extended_key_usage.is_empty() {
        let mut extended = EkuExtension::new();
        for usage in &template.extended_key_usage {
            match usage {
                ExtendedKeyUsage::ClientAuth => extended.client_auth(),
            };
        }
        builder.append_extension(extended.build()?)?;
    }

    // The context borrows the builder, so extensions that need it are
    // built first and appended afterwards.
    let (san, ski, aki) = {
        let context = builder.x509v3_context(Some(ca.certificate()), None);

        let mut san = SubjectAlternativeName::new();
        for name in &template.dns_names {
            san.dns(name);
        }
        let san = san.build(&context)?;
        let ski = SubjectKeyIdentifier::new().build(&context)?;
        let aki = AuthorityKeyIdentifier::new().keyid(false).build(&context)?;
        (san, ski, aki)
    };
    builder.append_extension(san)?;
    builder.append_extension(ski)?;
    builder.append_extension(aki)?;

    builder.sign(ca.private_key(), MessageDigest::sha256())?;
    Ok(builder.build())
}

/// Builds the subject name, leaving out empty attributes.
///
/// The CN is added as a UTF8String directly, which skips the 64 character
/// upper bound openssl would otherwise apply. Domains can be longer.
fn subject_name(subject: &SubjectName) -> Result<X509Name, ErrorStack> {
    let mut name = X509NameBuilder::new()?;
    for (nid, value) in [
        (Nid::COUNTRYNAME, &subject.country),
        (Nid::STATEORPROVINCENAME, &subject.province),
        (Nid::LOCALITYNAME, &subject.locality),
    ] {
        if !value.is_empty() {
            name.append_entry_by_nid(nid, value)?;
        }
    }
    name.append_entry_by_nid_with_type(
        Nid::COMMONNAME,
        &subject.common_name,
        Asn1Type::UTF8STRING,
    )?;
    Ok(name.build())
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use openssl::x509::X509VerifyResult;

    use super::*;
    use crate::engine::context::IssuancePolicy;
    use crate::engine::keys::generate_key;
    use crate::engine::template::LeafRequest;
    use crate::test::TestCa;

    fn entry(cert: &X509, nid: Nid) -> Option<String> {
        cert.subject_name()
            .entries_by_nid(nid)
            .next()
            .map(|e| e.data().as_utf8().unwrap().to_string())
    }

    #[test]
    fn sign_leaf() {
        let ca = TestCa::create("Signer Test Root");
        let context = ca.context(IssuancePolicy::default());
        let signing = context.validate().unwrap();

        let request = LeafRequest::new("example.com", false).unwrap();
        let template = LeafTemplate::build(&request, context.policy()).unwrap();
        let key = generate_key(2048).unwrap();

        let cert = sign(&template, &key, signing).unwrap();

        assert!(cert.verify(&ca.certificate().public_key().unwrap()).unwrap());
        assert_eq!(ca.certificate().issued(&cert), X509VerifyResult::OK);
        assert!(cert.public_key().unwrap().public_eq(&key));

        assert_eq!(entry(&cert, Nid::COMMONNAME).as_deref(), Some("example.com"));
        assert_eq!(entry(&cert, Nid::LOCALITYNAME).as_deref(), Some("Saint Louis"));
        assert_eq!(entry(&cert, Nid::STATEORPROVINCENAME).as_deref(), Some("Missouri"));
        assert_eq!(entry(&cert, Nid::COUNTRYNAME).as_deref(), Some("US"));

        let serial = cert.serial_number().to_bn().unwrap();
        assert_eq!(serial, BigNum::from_slice(&template.serial.to_be_bytes()).unwrap());

        let diff = cert.not_before().diff(cert.not_after()).unwrap();
        assert_eq!(diff.days, 30);
        assert_eq!(diff.secs, 0);
    }

    #[test]
    fn empty_subject_defaults_are_left_out() {
        let ca = TestCa::create("Signer Test Root");
        let mut policy = IssuancePolicy::default();
        policy.subject.locality.clear();
        policy.subject.province.clear();
        let context = ca.context(policy);

        let request = LeafRequest::new("example.com", false).unwrap();
        let template = LeafTemplate::build(&request, context.policy()).unwrap();
        let key = generate_key(2048).unwrap();
        let cert = sign(&template, &key, context.validate().unwrap()).unwrap();

        assert_eq!(entry(&cert, Nid::LOCALITYNAME), None);
        assert_eq!(entry(&cert, Nid::STATEORPROVINCENAME), None);
        assert_eq!(entry(&cert, Nid::COUNTRYNAME).as_deref(), Some("US"));
    }

    #[test]
    fn common_name_longer_than_64_characters() {
        let ca = TestCa::create("Signer Test Root");
        let context = ca.context(IssuancePolicy::default());

        let domain = format!("{}.example.com", "a".repeat(60));
        assert_eq!(domain.len(), 72);
        let request = LeafRequest::new(&domain, false).unwrap();
        let template = LeafTemplate::build(&request, context.policy()).unwrap();
        let key = generate_key(2048).unwrap();
        let cert = sign(&template, &key, context.validate().unwrap()).unwrap();

        assert_eq!(entry(&cert, Nid::COMMONNAME).as_deref(), Some(domain.as_str()));
        assert!(cert.verify(&ca.certificate().public_key().unwrap()).unwrap());
    }

    #[test]
    fn absurd_validity_is_a_signing_error() {
        let ca = TestCa::create("Signer Test Root");
        let context = ca.context(IssuancePolicy::default());
        let request = LeafRequest::new("example.com", false).unwrap();
        let mut template = LeafTemplate::build(&request, context.policy()).unwrap();
        template.validity = Duration::from_secs(u64::MAX);
        let key = generate_key(2048).unwrap();

        let res = sign(&template, &key, context.validate().unwrap());
        assert!(matches!(res, Err(Error::Signing(_))));
    }
}
