//! Java key store (JKS) containers
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! magic u32 (0xFEEDFEED) | version u32 (1 or 2) | count u32
//! count x entry:
//!   tag u32 (1 = private key, 2 = trusted certificate)
//!   alias (u16 length + modified UTF-8) | timestamp u64
//!   tag 1: protected key (u32 length + DER) | chain count u32 | certificates
//!   tag 2: certificate
//!   certificate: [v2: type name] | u32 length + DER
//! SHA-1( UTF-16BE(password) || "Mighty Aphrodite" || all of the above )
//! ```
//!
//! Private keys are wrapped in an `EncryptedPrivateKeyInfo` using the JKS
//! key protector: `salt(20) || ciphertext || check(20)`, where the key
//! stream is the chain of SHA-1 digests `H(pw || salt)`, `H(pw || d1)`, ...
//! and `check = H(pw || plaintext)`.

use super::{DecodeError, KeyRecoveryError, KeySource, RawEntry};
use crate::secret::Secret;
use openssl::memcmp;
use openssl::pkey::{PKey, Private};
use openssl::sha::Sha1;
use openssl::x509::X509;
use zeroize::Zeroize;

const MAGIC: u32 = 0xFEED_FEED;
const JCEKS_MAGIC: u32 = 0xCECE_CECE;
const TAG_PRIVATE_KEY: u32 = 1;
const TAG_TRUSTED_CERT: u32 = 2;
const DIGEST_LEN: usize = 20;
const WHITENER: &[u8] = b"Mighty Aphrodite";

/// 1.3.6.1.4.1.42.2.17.1.1, DER content bytes
const KEY_PROTECTOR_OID: &[u8] = &[0x2b, 0x06, 0x01, 0x04, 0x01, 0x2a, 0x02, 0x11, 0x01, 0x01];

const DER_SEQUENCE: u8 = 0x30;
const DER_OID: u8 = 0x06;
const DER_OCTET_STRING: u8 = 0x04;

/// Decode a JKS container, checking its integrity digest with `password`
pub(crate) fn decode(data: &[u8], password: &Secret) -> Result<Vec<RawEntry>, DecodeError> {
    if data.len() < 12 + DIGEST_LEN {
        return Err(DecodeError::TooShort);
    }

    let mut reader = Reader::new(data);
    match reader.u32()? {
        MAGIC => {}
        JCEKS_MAGIC => return Err(DecodeError::Jceks),
        other => return Err(DecodeError::BadMagic(other)),
    }

    let (body, stored_digest) = data.split_at(data.len() - DIGEST_LEN);
    let expected = integrity_digest(password, body);
    if !memcmp::eq(&expected, stored_digest) {
        return Err(DecodeError::IntegrityCheckFailed);
    }

    let mut reader = Reader::new(&body[4..]);
    let version = reader.u32()?;
    if version != 1 && version != 2 {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let count = reader.u32()?;
    let mut entries = Vec::new();

    for _ in 0..count {
        let tag = reader.u32()?;
        let alias = reader.utf()?;
        let _timestamp = reader.u64()?;

        match tag {
            TAG_PRIVATE_KEY => {
                let protected = reader.block()?.to_vec();
                let chain_len = reader.u32()?;
                let mut chain = Vec::new();
                for _ in 0..chain_len {
                    chain.push(reader.certificate(version)?);
                }
                if chain.is_empty() {
                    return Err(DecodeError::MissingChain(alias));
                }
                let certificate = chain.remove(0);

                entries.push(RawEntry::PrivateKey {
                    alias,
                    key: KeySource::JksProtected(protected),
                    certificate,
                    chain,
                });
            }
            TAG_TRUSTED_CERT => {
                let certificate = reader.certificate(version)?;
                entries.push(RawEntry::TrustedCertificate { alias, certificate });
            }
            tag => return Err(DecodeError::UnknownTag { alias, tag }),
        }
    }

    if !reader.is_empty() {
        return Err(DecodeError::TrailingBytes);
    }

    Ok(entries)
}

/// Recover a JKS-protected private key
pub(crate) fn recover_key(protected: &[u8], password: &Secret) -> Result<PKey<Private>, KeyRecoveryError> {
    let (info, rest) = der_element(protected, DER_SEQUENCE)?;
    if !rest.is_empty() {
        return Err(KeyRecoveryError::Malformed("trailing bytes after protected key"));
    }

    let (algorithm, info) = der_element(info, DER_SEQUENCE)?;
    let (oid, _params) = der_element(algorithm, DER_OID)?;
    if oid != KEY_PROTECTOR_OID {
        return Err(KeyRecoveryError::UnknownProtector);
    }

    let (encrypted, _) = der_element(info, DER_OCTET_STRING)?;
    if encrypted.len() <= 2 * DIGEST_LEN {
        return Err(KeyRecoveryError::Malformed("protected key is truncated"));
    }

    let salt = &encrypted[..DIGEST_LEN];
    let ciphertext = &encrypted[DIGEST_LEN..encrypted.len() - DIGEST_LEN];
    let check = &encrypted[encrypted.len() - DIGEST_LEN..];

    let mut pw = password.utf16_be();
    let mut plaintext = apply_keystream(&pw, salt, ciphertext);

    let mut hasher = Sha1::new();
    hasher.update(&pw);
    hasher.update(&plaintext);
    let matches = memcmp::eq(&hasher.finish(), check);
    pw.zeroize();

    if !matches {
        plaintext.zeroize();
        return Err(KeyRecoveryError::PasswordMismatch);
    }

    let key = PKey::private_key_from_pkcs8(&plaintext)
        .map_err(KeyRecoveryError::NotPkcs8);
    plaintext.zeroize();
    key
}

/// XOR `input` with the SHA-1 digest chain seeded by `salt`
fn apply_keystream(pw: &[u8], salt: &[u8], input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(salt);

    for block in input.chunks(DIGEST_LEN) {
        let mut hasher = Sha1::new();
        hasher.update(pw);
        hasher.update(&digest);
        digest = hasher.finish();

        output.extend(block.iter().zip(digest.iter()).map(|(b, k)| b ^ k));
    }

    digest.zeroize();
    output
}

fn integrity_digest(password: &Secret, body: &[u8]) -> [u8; DIGEST_LEN] {
    let mut pw = password.utf16_be();
    let mut hasher = Sha1::new();
    hasher.update(&pw);
    hasher.update(WHITENER);
    hasher.update(body);
    pw.zeroize();
    hasher.finish()
}

/// Split one DER element off `input`, returning (content, rest)
fn der_element(input: &[u8], tag: u8) -> Result<(&[u8], &[u8]), KeyRecoveryError> {
    let (&found, input) = input
        .split_first()
        .ok_or(KeyRecoveryError::Malformed("truncated DER element"))?;
    if found != tag {
        return Err(KeyRecoveryError::UnexpectedTag { expected: tag, found });
    }

    let (&first, mut input) = input
        .split_first()
        .ok_or(KeyRecoveryError::Malformed("truncated DER length"))?;

    let len = if first < 0x80 {
        first as usize
    } else {
        let octets = (first & 0x7f) as usize;
        if octets == 0 || octets > 4 || input.len() < octets {
            return Err(KeyRecoveryError::Malformed("unsupported DER length"));
        }
        let len = input[..octets]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        input = &input[octets..];
        len
    };

    if input.len() < len {
        return Err(KeyRecoveryError::Malformed("truncated DER content"));
    }
    Ok(input.split_at(len))
}

/// Big-endian cursor over the key store body
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.buf.len() - self.pos < n {
            return Err(DecodeError::Truncated(self.pos));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_be_bytes(raw))
    }

    /// Length-prefixed (u32) byte block
    fn block(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    /// Java modified UTF-8 string; aliases are plain text in practice
    fn utf(&mut self) -> Result<String, DecodeError> {
        let len = self.u16()? as usize;
        let raw = self.take(len)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    fn certificate(&mut self, version: u32) -> Result<X509, DecodeError> {
        if version == 2 {
            let kind = self.utf()?;
            if kind != "X.509" {
                return Err(DecodeError::CertificateType(kind));
            }
        }
        let der = self.block()?;
        X509::from_der(der).map_err(DecodeError::BadCertificate)
    }

    fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }
}

/// Writers used to produce fixtures
#[cfg(test)]
pub(crate) mod writer {
    use super::*;

    pub(crate) enum Entry<'a> {
        Key {
            alias: &'a str,
            key: &'a PKey<Private>,
            chain: &'a [X509],
        },
        Trusted {
            alias: &'a str,
            certificate: &'a X509,
        },
    }

    fn der(tag: u8, content: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        let len = content.len();
        if len < 0x80 {
            out.push(len as u8);
        } else {
            let bytes = (len as u32).to_be_bytes();
            let skip = bytes.iter().take_while(|b| **b == 0).count();
            out.push(0x80 | (4 - skip) as u8);
            out.extend_from_slice(&bytes[skip..]);
        }
        out.extend_from_slice(content);
        out
    }

    /// Wrap a PKCS#8 key with the JKS key protector
    pub(crate) fn protect_key(key: &PKey<Private>, password: &Secret) -> Vec<u8> {
        let plaintext = key.private_key_to_pkcs8().unwrap();
        let pw = password.utf16_be();
        let salt = [0x5au8; DIGEST_LEN];

        let mut encrypted = salt.to_vec();
        encrypted.extend(apply_keystream(&pw, &salt, &plaintext));
        let mut hasher = Sha1::new();
        hasher.update(&pw);
        hasher.update(&plaintext);
        encrypted.extend_from_slice(&hasher.finish());

        let mut algorithm = der(DER_OID, KEY_PROTECTOR_OID);
        algorithm.extend_from_slice(&[0x05, 0x00]);
        let mut info = der(DER_SEQUENCE, &algorithm);
        info.extend(der(DER_OCTET_STRING, &encrypted));
        der(DER_SEQUENCE, &info)
    }

    fn put_utf(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    fn put_certificate(out: &mut Vec<u8>, certificate: &X509) {
        put_utf(out, "X.509");
        let der = certificate.to_der().unwrap();
        out.extend_from_slice(&(der.len() as u32).to_be_bytes());
        out.extend_from_slice(&der);
    }

    /// Encode a version 2 JKS container
    pub(crate) fn encode(entries: &[Entry<'_>], store_password: &Secret, key_password: &Secret) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&2u32.to_be_bytes());
        out.extend_from_slice(&(entries.len() as u32).to_be_bytes());

        for entry in entries {
            match entry {
                Entry::Key { alias, key, chain } => {
                    out.extend_from_slice(&TAG_PRIVATE_KEY.to_be_bytes());
                    put_utf(&mut out, alias);
                    out.extend_from_slice(&0u64.to_be_bytes());
                    let protected = protect_key(key, key_password);
                    out.extend_from_slice(&(protected.len() as u32).to_be_bytes());
                    out.extend_from_slice(&protected);
                    out.extend_from_slice(&(chain.len() as u32).to_be_bytes());
                    for certificate in chain.iter() {
                        put_certificate(&mut out, certificate);
                    }
                }
                Entry::Trusted { alias, certificate } => {
                    out.extend_from_slice(&TAG_TRUSTED_CERT.to_be_bytes());
                    put_utf(&mut out, alias);
                    out.extend_from_slice(&0u64.to_be_bytes());
                    put_certificate(&mut out, certificate);
                }
            }
        }

        let digest = integrity_digest(store_password, &out);
        out.extend_from_slice(&digest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::writer::{encode, protect_key, Entry};
    use super::*;
    use crate::keystore::fixtures;

    #[test]
    fn test_decode_key_entry() {
        let (key, cert) = fixtures::self_signed("client");
        let password = Secret::from("changeit");
        let chain = [cert];
        let data = encode(&[Entry::Key { alias: "client", key: &key, chain: &chain }], &password, &password);

        let entries = decode(&data, &password).unwrap();
        assert_eq!(entries.len(), 1);
        match &entries[0] {
            RawEntry::PrivateKey { alias, key: KeySource::JksProtected(protected), chain, .. } => {
                assert_eq!(alias, "client");
                assert!(chain.is_empty());
                let recovered = recover_key(protected, &password).unwrap();
                assert!(recovered.public_eq(&key));
            }
            _ => panic!("expected a protected private key entry"),
        }
    }

    #[test]
    fn test_wrong_password_fails_integrity_check() {
        let (_, cert) = fixtures::self_signed("ca");
        let password = Secret::from("changeit");
        let data = encode(&[Entry::Trusted { alias: "ca", certificate: &cert }], &password, &password);

        let err = decode(&data, &Secret::from("wrong")).unwrap_err();
        assert!(matches!(err, DecodeError::IntegrityCheckFailed));
    }

    #[test]
    fn test_corrupted_body_fails_integrity_check() {
        let (_, cert) = fixtures::self_signed("ca");
        let password = Secret::from("changeit");
        let mut data = encode(&[Entry::Trusted { alias: "ca", certificate: &cert }], &password, &password);
        data[20] ^= 0xff;

        assert!(matches!(
            decode(&data, &password),
            Err(DecodeError::IntegrityCheckFailed)
        ));
    }

    #[test]
    fn test_jceks_rejected() {
        let mut data = JCEKS_MAGIC.to_be_bytes().to_vec();
        data.resize(64, 0);
        let err = decode(&data, &Secret::from("changeit")).unwrap_err();
        assert!(matches!(err, DecodeError::Jceks));
        assert!(err.to_string().contains("JCEKS"));
    }

    #[test]
    fn test_bad_magic_and_short_input() {
        assert!(matches!(decode(&[0u8; 8], &Secret::from("x")), Err(DecodeError::TooShort)));
        assert!(matches!(decode(&[0u8; 64], &Secret::from("x")), Err(DecodeError::BadMagic(0))));
    }

    #[test]
    fn test_recover_key_with_other_password_fails() {
        let (key, _) = fixtures::self_signed("client");
        let protected = protect_key(&key, &Secret::from("key-pass"));

        let err = recover_key(&protected, &Secret::from("store-pass")).unwrap_err();
        assert!(matches!(err, KeyRecoveryError::PasswordMismatch));
    }

    #[test]
    fn test_der_element_long_length() {
        let mut input = vec![DER_OCTET_STRING, 0x81, 0x90];
        input.extend(std::iter::repeat(7u8).take(0x90));
        input.push(0xaa);

        let (content, rest) = der_element(&input, DER_OCTET_STRING).unwrap();
        assert_eq!(content.len(), 0x90);
        assert_eq!(rest, &[0xaa]);
        assert!(matches!(
            der_element(&input, DER_SEQUENCE),
            Err(KeyRecoveryError::UnexpectedTag { expected: DER_SEQUENCE, found: DER_OCTET_STRING })
        ));
    }
}
