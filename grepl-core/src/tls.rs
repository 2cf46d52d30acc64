//! # Transport Security
//!
//! This module turns the credential file paths of a session (trusted CA bundle, client
//! certificate and client key) into a validated [`TransportSecurity`].
//!
//! ## Modes
//!
//! * **Server TLS**: no file is given. The server certificate is verified against the bundled
//!   webpki roots.
//! * **Server TLS with a trusted CA**: the CA bundle replaces the bundled roots.
//! * **Mutual TLS**: a certificate *and* its key are given and presented to the server.
//!
//! Giving only one half of the client key pair is rejected with
//! [`TlsError::MutualAuthParamsInsufficient`], a dedicated variant callers can match on.
//!
//! The same validated material is rendered for both transports: [`TransportSecurity::to_tonic`]
//! for the standard HTTP/2 channel and [`TransportSecurity::to_rustls`] for the gRPC-Web
//! HTTPS connector.
use rustls::RootCertStore;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};
use tonic::transport::{Certificate, ClientTlsConfig, Identity};

/// The role a credential file plays, used to tell which file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRole {
    CaCertificate,
    Certificate,
    CertificateKey,
}

impl fmt::Display for CredentialRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialRole::CaCertificate => write!(f, "CA certificate"),
            CredentialRole::Certificate => write!(f, "client certificate"),
            CredentialRole::CertificateKey => write!(f, "client certificate key"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Failed to read the {role} '{}': '{source}'", .path.display())]
    Read {
        role: CredentialRole,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse the {role} '{}': '{source}'", .path.display())]
    Parse {
        role: CredentialRole,
        path: PathBuf,
        #[source]
        source: rustls_pki_types::pem::Error,
    },
    #[error("The {role} '{}' does not contain any valid certificate", .path.display())]
    NoCertificate { role: CredentialRole, path: PathBuf },
    #[error("cert and certkey are required to authenticate mutually")]
    MutualAuthParamsInsufficient,
    #[error("Invalid TLS configuration: '{0}'")]
    Rustls(#[from] rustls::Error),
}

#[derive(Debug)]
struct TrustedRoots {
    pem: Vec<u8>,
    certs: Vec<CertificateDer<'static>>,
}

#[derive(Debug)]
struct ClientIdentity {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

/// A validated transport security configuration.
///
/// Built once per client, immutable afterwards.
#[derive(Debug, Default)]
pub struct TransportSecurity {
    roots: Option<TrustedRoots>,
    identity: Option<ClientIdentity>,
}

impl TransportSecurity {
    /// Builds a configuration from the given credential paths. Empty paths are treated as absent.
    ///
    /// # Returns
    ///
    /// * `Ok(TransportSecurity)` - The validated configuration (possibly empty).
    /// * `Err(TlsError::MutualAuthParamsInsufficient)` - Only one of `cert` / `cert_key` was given.
    /// * `Err(TlsError)` - A file could not be read or does not hold valid PEM data.
    pub fn build(
        ca_cert: impl AsRef<Path>,
        cert: impl AsRef<Path>,
        cert_key: impl AsRef<Path>,
    ) -> Result<Self, TlsError> {
        let (ca_cert, cert, cert_key) = (ca_cert.as_ref(), cert.as_ref(), cert_key.as_ref());

        let roots = is_given(ca_cert)
            .then(|| load_roots(ca_cert))
            .transpose()?;

        let identity = match (is_given(cert), is_given(cert_key)) {
            (true, true) => Some(load_identity(cert, cert_key)?),
            (false, false) => None,
            _ => return Err(TlsError::MutualAuthParamsInsufficient),
        };

        let security = Self { roots, identity };

        // Mismatched or unsupported key pairs are rejected here, not on the first handshake.
        security.to_rustls()?;

        tracing::debug!(
            custom_roots = security.has_custom_roots(),
            mutual = security.is_mutual(),
            "Transport security configured"
        );

        Ok(security)
    }

    /// Whether a client key pair is presented to the server.
    pub fn is_mutual(&self) -> bool {
        self.identity.is_some()
    }

    /// Whether a CA bundle replaces the bundled webpki roots.
    pub fn has_custom_roots(&self) -> bool {
        self.roots.is_some()
    }

    /// Renders the configuration for a `tonic` channel.
    ///
    /// `server_name` overrides the name used to verify the server certificate.
    pub fn to_tonic(&self, server_name: Option<&str>) -> ClientTlsConfig {
        let mut config = match &self.roots {
            Some(roots) => ClientTlsConfig::new().ca_certificate(Certificate::from_pem(&roots.pem)),
            None => ClientTlsConfig::new().with_webpki_roots(),
        };

        if let Some(identity) = &self.identity {
            config = config.identity(Identity::from_pem(&identity.cert_pem, &identity.key_pem));
        }

        if let Some(name) = server_name.filter(|name| !name.is_empty()) {
            config = config.domain_name(name);
        }

        config
    }

    /// Renders the configuration as a `rustls` client configuration using the `ring` provider.
    pub fn to_rustls(&self) -> Result<rustls::ClientConfig, TlsError> {
        let mut store = RootCertStore::empty();

        match &self.roots {
            Some(roots) => {
                store.add_parsable_certificates(roots.certs.iter().cloned());
            }
            None => store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
        }

        let builder = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(store);

        let config = match &self.identity {
            Some(identity) => {
                builder.with_client_auth_cert(identity.chain.clone(), identity.key.clone_key())?
            }
            None => builder.with_no_client_auth(),
        };

        Ok(config)
    }
}

fn is_given(path: &Path) -> bool {
    !path.as_os_str().is_empty()
}

fn read(role: CredentialRole, path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::Read {
        role,
        path: path.to_path_buf(),
        source,
    })
}

fn parse_certificates(
    role: CredentialRole,
    path: &Path,
    pem: &[u8],
) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Parse {
            role,
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificate {
            role,
            path: path.to_path_buf(),
        });
    }

    Ok(certs)
}

fn load_roots(path: &Path) -> Result<TrustedRoots, TlsError> {
    let role = CredentialRole::CaCertificate;
    let pem = read(role, path)?;
    let certs = parse_certificates(role, path, &pem)?;

    let (valid, _) = RootCertStore::empty().add_parsable_certificates(certs.iter().cloned());
    if valid == 0 {
        return Err(TlsError::NoCertificate {
            role,
            path: path.to_path_buf(),
        });
    }

    Ok(TrustedRoots { pem, certs })
}

fn load_identity(cert: &Path, cert_key: &Path) -> Result<ClientIdentity, TlsError> {
    let cert_pem = read(CredentialRole::Certificate, cert)?;
    let key_pem = read(CredentialRole::CertificateKey, cert_key)?;

    let chain = parse_certificates(CredentialRole::Certificate, cert, &cert_pem)?;
    let key = PrivateKeyDer::from_pem_slice(&key_pem).map_err(|source| TlsError::Parse {
        role: CredentialRole::CertificateKey,
        path: cert_key.to_path_buf(),
        source,
    })?;

    Ok(ClientIdentity {
        cert_pem,
        key_pem,
        chain,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pem_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn self_signed() -> (NamedTempFile, NamedTempFile) {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (pem_file(&cert.pem()), pem_file(&key_pair.serialize_pem()))
    }

    #[test]
    fn test_insufficient_mutual_auth_params() {
        let (ca, _) = self_signed();

        for ca_path in [Path::new(""), ca.path()] {
            let only_cert = TransportSecurity::build(ca_path, "cert.pem", "");
            assert!(matches!(
                only_cert,
                Err(TlsError::MutualAuthParamsInsufficient)
            ));

            let only_key = TransportSecurity::build(ca_path, "", "key.pem");
            assert!(matches!(
                only_key,
                Err(TlsError::MutualAuthParamsInsufficient)
            ));
        }
    }

    #[test]
    fn test_empty_configuration() {
        let security = TransportSecurity::build("", "", "").unwrap();
        assert!(!security.is_mutual());
        assert!(!security.has_custom_roots());
        assert!(security.to_rustls().is_ok());
    }

    #[test]
    fn test_trusted_ca() {
        let (ca, _) = self_signed();

        let security = TransportSecurity::build(ca.path(), "", "").unwrap();
        assert!(security.has_custom_roots());
        assert!(!security.is_mutual());
    }

    #[test]
    fn test_mutual_tls() {
        let (ca, _) = self_signed();
        let (cert, key) = self_signed();

        let security = TransportSecurity::build(ca.path(), cert.path(), key.path()).unwrap();
        assert!(security.has_custom_roots());
        assert!(security.is_mutual());
    }

    #[test]
    fn test_missing_files_report_their_role() {
        let result = TransportSecurity::build("does-not-exist-ca.pem", "", "");
        assert!(matches!(
            result,
            Err(TlsError::Read {
                role: CredentialRole::CaCertificate,
                ..
            })
        ));

        let (_, key) = self_signed();
        let result = TransportSecurity::build("", "does-not-exist.pem", key.path());
        assert!(matches!(
            result,
            Err(TlsError::Read {
                role: CredentialRole::Certificate,
                ..
            })
        ));

        let (cert, _) = self_signed();
        let result = TransportSecurity::build("", cert.path(), "does-not-exist-key.pem");
        assert!(matches!(
            result,
            Err(TlsError::Read {
                role: CredentialRole::CertificateKey,
                ..
            })
        ));
    }

    #[test]
    fn test_ca_bundle_without_certificates() {
        let garbage = pem_file("this is not a certificate bundle\n");

        let result = TransportSecurity::build(garbage.path(), "", "");
        assert!(matches!(
            result,
            Err(TlsError::NoCertificate {
                role: CredentialRole::CaCertificate,
                ..
            })
        ));
    }

    #[test]
    fn test_key_file_without_private_key() {
        let (cert, _) = self_signed();
        let (other_cert, _) = self_signed();

        // A certificate is not a private key
        let result = TransportSecurity::build("", cert.path(), other_cert.path());
        assert!(matches!(
            result,
            Err(TlsError::Parse {
                role: CredentialRole::CertificateKey,
                ..
            })
        ));
    }
}
