use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use rustls::{ClientConfig, RootCertStore, crypto::aws_lc_rs};
use thiserror::Error;
use tracing::debug;

/// Represents the kind of error that can occur while building the TLS client configuration
#[derive(Error, Debug)]
pub enum TlsSetupError {
    /// The CA bundle could not be read.
    #[error("failed to read CA bundle {path}: {source}")]
    Io {
        /// The bundle that failed.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// The CA bundle contains no certificate rustls accepts.
    #[error("no usable certificates in {0}")]
    NoCertificates(PathBuf),

    /// rustls rejected the configuration.
    #[error("TLS configuration error: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Builds the client configuration shared by all requests.
///
/// The server certificate is verified against the bundled web PKI roots, plus the certificates in
/// `ca_file` if one is given.
///
/// # Errors
///
/// Throws a `TlsSetupError` if the bundle cannot be read or holds no certificates.
pub fn client_config(ca_file: Option<&Path>) -> Result<Arc<ClientConfig>, TlsSetupError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = ca_file {
        add_ca_file(&mut roots, path)?;
    }

    config_with_roots(roots)
}

/// Builds a client configuration trusting exactly `roots`.
///
/// # Errors
///
/// Throws a `TlsSetupError` if the crypto provider supports none of the default protocol
/// versions.
pub fn config_with_roots(roots: RootCertStore) -> Result<Arc<ClientConfig>, TlsSetupError> {
    let config = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

fn add_ca_file(roots: &mut RootCertStore, path: &Path) -> Result<(), TlsSetupError> {
    let io_error = |source| TlsSetupError::Io { path: path.to_path_buf(), source };

    let file = File::open(path).map_err(io_error)?;
    let certificates = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error)?;

    let (added, ignored) = roots.add_parsable_certificates(certificates);
    debug!(path = %path.display(), added, ignored, "loaded CA bundle");
    if added == 0 {
        return Err(TlsSetupError::NoCertificates(path.to_path_buf()));
    }
    Ok(())
}
