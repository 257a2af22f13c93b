//! Certificate location discovery
//!
//! The bridge serves TLS from `<datadir>/certs/scbridge.chain` +
//! `scbridge.key`. Packaged installs put the datadir under /var/lib;
//! development runs use the working directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::cli::Cli;

const DATA_DIR_CANDIDATES: &[&str] = &["/var/lib/scbridge", "."];
const CHAIN_FILE: &str = "certs/scbridge.chain";
const KEY_FILE: &str = "certs/scbridge.key";

/// Resolved TLS material locations
#[derive(Debug)]
pub(crate) struct TlsPaths {
    pub(crate) chain: PathBuf,
    pub(crate) key: PathBuf,
}

/// Resolve the certificate chain and key paths from CLI flags or the
/// datadir search, failing startup if nothing is found
pub(crate) fn resolve_tls_paths(cli: &Cli) -> Result<TlsPaths> {
    if let (Some(chain), Some(key)) = (&cli.cert, &cli.key) {
        return Ok(TlsPaths {
            chain: chain.clone(),
            key: key.clone(),
        });
    }

    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => find_data_dir()
            .ok_or_else(|| anyhow::anyhow!("no data directory with certs found; did you generate the certificate?"))?,
    };

    let paths = TlsPaths {
        chain: data_dir.join(CHAIN_FILE),
        key: data_dir.join(KEY_FILE),
    };
    if !paths.chain.is_file() {
        bail!("certificate chain not found at {}", paths.chain.display());
    }
    Ok(paths)
}

fn find_data_dir() -> Option<PathBuf> {
    DATA_DIR_CANDIDATES
        .iter()
        .map(Path::new)
        .find(|dir| dir.join(CHAIN_FILE).is_file())
        .map(Path::to_path_buf)
}
