//! Throwaway certificate authority for TLS tests

use rcgen::{BasicConstraints, Certificate, CertificateParams, DnType, IsCa};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const KEYSTORE_PASSWORD: &str = "kspass";

/// Certificate and PKCS#8 key issued by a [`TestPki`]
pub struct Identity {
    pub cert_pem: String,
    pub cert_der: Vec<u8>,
    pub key_pem: String,
    pub key_der: Vec<u8>,
}

impl Identity {
    pub fn cert(&self) -> CertificateDer<'static> {
        CertificateDer::from(self.cert_der.clone())
    }

    pub fn key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }
}

pub struct TestPki {
    pub dir: TempDir,
    ca: Certificate,
}

impl TestPki {
    pub fn new() -> Self {
        let mut params = CertificateParams::new(Vec::<String>::new());
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params
            .distinguished_name
            .push(DnType::CommonName, "broker-agent test CA");

        Self {
            dir: TempDir::new().expect("tempdir"),
            ca: Certificate::from_params(params).expect("ca params"),
        }
    }

    pub fn ca_pem(&self) -> String {
        self.ca.serialize_pem().expect("ca pem")
    }

    pub fn ca_cert(&self) -> CertificateDer<'static> {
        CertificateDer::from(self.ca.serialize_der().expect("ca der"))
    }

    /// Leaf certificate for `name`, signed by the CA
    pub fn issue(&self, name: &str) -> Identity {
        let mut params = CertificateParams::new(vec![name.to_string()]);
        params.distinguished_name.push(DnType::CommonName, name);
        let cert = Certificate::from_params(params).expect("leaf params");

        Identity {
            cert_pem: cert.serialize_pem_with_signer(&self.ca).expect("leaf pem"),
            cert_der: cert.serialize_der_with_signer(&self.ca).expect("leaf der"),
            key_pem: cert.serialize_private_key_pem(),
            key_der: cert.serialize_private_key_der(),
        }
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write");
        path
    }

    /// Keystore for `localhost` and a truststore holding the CA
    pub fn server_stores(&self) -> (PathBuf, PathBuf) {
        let server = self.issue("localhost");
        let keystore = self.write(
            "keystore.pem",
            &format!("{}{}", server.cert_pem, server.key_pem),
        );
        let truststore = self.write("truststore.pem", &self.ca_pem());
        (keystore, truststore)
    }
}

/// Encrypt a PKCS#8 key with PBES2 (PBKDF2-SHA256, AES-256-CBC)
pub fn encrypt_key_pem(key_der: &[u8], password: &str) -> String {
    let key = pkcs8::PrivateKeyInfo::try_from(key_der).expect("pkcs8 key");
    let iv = [7u8; 16];
    let params = pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(2048, b"broker-agent", &iv)
        .expect("pbes2 params");
    let encrypted = key
        .encrypt_with_params(params, password)
        .expect("encrypt key");
    let pem = encrypted
        .to_pem("ENCRYPTED PRIVATE KEY", pkcs8::der::pem::LineEnding::LF)
        .expect("encrypted pem");
    pem.as_str().to_owned()
}
