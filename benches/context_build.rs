//! Context assembly benchmarks
//!
//! This benchmark suite measures:
//! - PKCS12 key store loading
//! - Full pipeline from configuration to TLS context
//! - TLS context construction from already loaded key material
//!
//! Run with: cargo bench --bench context_build

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::x509::{X509NameBuilder, X509};
use sslctx::tls::{ContextBuilder, TrustPolicyHandle};
use sslctx::{build_context, keystore, ContextConfig, Secret};
use std::path::{Path, PathBuf};
use std::time::Duration;

const PASSWORD: &str = "bench-secret";

fn write_store(dir: &Path) -> PathBuf {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, "bench").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    let cert = builder.build();

    let der = Pkcs12::builder()
        .name("bench")
        .pkey(&key)
        .cert(&cert)
        .build2(PASSWORD)
        .unwrap()
        .to_der()
        .unwrap();

    let path = dir.join("bench.p12");
    std::fs::write(&path, der).unwrap();
    path
}

fn bench_keystore_load(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_store(dir.path());
    let password = Secret::from(PASSWORD);

    c.bench_function("keystore_load_pkcs12", |b| {
        b.iter(|| {
            let material = keystore::load(black_box(&path), &password, None, None).unwrap();
            black_box(material);
        });
    });
}

fn bench_context_from_material(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_store(dir.path());
    let password = Secret::from(PASSWORD);

    c.bench_function("context_from_material", |b| {
        b.iter_batched(
            || keystore::load(&path, &password, None, None).unwrap(),
            |material| {
                let context = ContextBuilder::new(material, TrustPolicyHandle::insecure_trust_all())
                    .protocol("TLSv1.3")
                    .build()
                    .unwrap();
                black_box(context);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_store(dir.path());
    let config = ContextConfig::builder(&path, PASSWORD)
        .strict_name_matching(false)
        .build()
        .unwrap();

    c.bench_function("build_context_pipeline", |b| {
        b.iter(|| {
            let context = build_context(black_box(&config)).unwrap();
            black_box(context);
        });
    });
}

criterion_group! {
    name = context_build;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(100);
    targets =
        bench_keystore_load,
        bench_context_from_material,
        bench_full_pipeline
}

criterion_main!(context_build);
