//! TLS acceptor construction from PEM material

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_rustls::TlsAcceptor;

use crate::config::TlsPaths;

/// Build a TLS acceptor from the chain and key files
///
/// Startup-fatal on failure: a bridge that cannot present the expected
/// certificate is useless to the portal.
pub(crate) fn acceptor(paths: &TlsPaths) -> Result<TlsAcceptor> {
    let chain_file = File::open(&paths.chain)
        .with_context(|| format!("opening certificate chain {}", paths.chain.display()))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(chain_file))
        .collect::<Result<Vec<_>, _>>()
        .context("parsing certificate chain")?;

    let key_file = File::open(&paths.key)
        .with_context(|| format!("opening private key {}", paths.key.display()))?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .context("parsing private key")?
        .with_context(|| format!("no private key in {}", paths.key.display()))?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("building TLS server config")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
