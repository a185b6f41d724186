//! Key store fixtures for unit tests

use super::jks::writer::{encode, Entry};
use crate::secret::Secret;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509};
use std::path::{Path, PathBuf};

/// Self-signed P-256 certificate with subject `C=US, O=Acme, CN=<cn>`
pub(crate) fn self_signed(cn: &str) -> (PKey<Private>, X509) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COUNTRYNAME, "US").unwrap();
    name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Acme").unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
    let san = SubjectAlternativeName::new()
        .dns(cn)
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(san).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (key, builder.build())
}

pub(crate) fn pkcs12_der(alias: &str, password: &str) -> Vec<u8> {
    let (key, cert) = self_signed(alias);
    Pkcs12::builder()
        .name(alias)
        .pkey(&key)
        .cert(&cert)
        .build2(password)
        .unwrap()
        .to_der()
        .unwrap()
}

pub(crate) fn write_pkcs12(dir: &Path, file: &str, alias: &str, password: &str) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, pkcs12_der(alias, password)).unwrap();
    path
}

pub(crate) fn write_jks(dir: &Path, file: &str, alias: &str, password: &str) -> PathBuf {
    let (key, cert) = self_signed(alias);
    let password = Secret::from(password);
    let chain = [cert];
    let data = encode(&[Entry::Key { alias, key: &key, chain: &chain }], &password, &password);

    let path = dir.join(file);
    std::fs::write(&path, data).unwrap();
    path
}

pub(crate) fn write_trust_only_jks(dir: &Path, file: &str, password: &str) -> PathBuf {
    let (_, cert) = self_signed("trusted-ca");
    let password = Secret::from(password);
    let data = encode(&[Entry::Trusted { alias: "ca", certificate: &cert }], &password, &password);

    let path = dir.join(file);
    std::fs::write(&path, data).unwrap();
    path
}

/// JKS store whose key is protected with a password other than the store's
pub(crate) fn write_jks_split_passwords(dir: &Path, file: &str, store: &str, key: &str) -> PathBuf {
    let (pkey, cert) = self_signed("client");
    let chain = [cert];
    let data = encode(
        &[Entry::Key { alias: "client", key: &pkey, chain: &chain }],
        &Secret::from(store),
        &Secret::from(key),
    );

    let path = dir.join(file);
    std::fs::write(&path, data).unwrap();
    path
}
