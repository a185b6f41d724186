//! Shared fixtures for integration tests
#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509};
use sslctx::tls::{ContextBuilder, TlsContext, TrustPolicyHandle};
use sslctx::{keystore, Secret};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// Self-signed P-256 certificate for `cn`
pub fn self_signed(cn: &str) -> (PKey<Private>, X509) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Integration").unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(7).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    let san = SubjectAlternativeName::new()
        .dns(cn)
        .ip("127.0.0.1")
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(san).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (key, builder.build())
}

/// Write a PKCS12 store holding a fresh identity for `alias`
pub fn write_pkcs12(dir: &Path, file: &str, alias: &str, password: &str) -> PathBuf {
    let (key, cert) = self_signed(alias);
    let der = Pkcs12::builder()
        .name(alias)
        .pkey(&key)
        .cert(&cert)
        .build2(password)
        .unwrap()
        .to_der()
        .unwrap();

    let path = dir.join(file);
    std::fs::write(&path, der).unwrap();
    path
}

/// Context holding a fresh identity for `alias`, trusting everything
pub fn context_for(dir: &Path, alias: &str) -> TlsContext {
    let path = write_pkcs12(dir, &format!("{}.p12", alias), alias, "secret");
    let material = keystore::load(&path, &Secret::from("secret"), None, None).unwrap();
    ContextBuilder::new(material, TrustPolicyHandle::insecure_trust_all())
        .build()
        .unwrap()
}

/// HTTPS server answering one connection per canned response
///
/// The join handle yields the request heads it received.
pub fn spawn_https_server(server_ctx: TlsContext, responses: Vec<Vec<u8>>) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let mut requests = Vec::new();

        for response in responses {
            let (tcp_stream, _) = listener.accept().unwrap();
            let session = server_ctx.accept(tcp_stream).unwrap();
            let mut reader = BufReader::new(session);

            let mut head = String::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                head.push_str(&line);
            }
            requests.push(head);

            let mut session = reader.into_inner();
            session.write_all(&response).unwrap();
            session.flush().unwrap();
            // The client may already be gone after reading what it needed
            let _ = session.close();
        }

        requests
    });

    (port, handle)
}
