//! Command-line interface

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(about, version)]
pub(crate) struct Cli {
    /// Address to listen on for portal requests
    #[arg(short, long, value_name = "ADDR", default_value = "127.0.0.1:31505")]
    pub(crate) listen: SocketAddr,

    /// Origin allowed to call the bridge (CORS and request gate)
    #[arg(long, value_name = "ORIGIN", default_value = "https://secure.buypass.no")]
    pub(crate) origin: String,

    /// Data directory holding certs/; defaults to the first of
    /// /var/lib/scbridge and . that contains one
    #[arg(long, value_name = "DIR")]
    pub(crate) data_dir: Option<PathBuf>,

    /// TLS certificate chain (PEM); overrides the data-dir location
    #[arg(long, value_name = "FILE", requires = "key")]
    pub(crate) cert: Option<PathBuf>,

    /// TLS private key (PEM); overrides the data-dir location
    #[arg(long, value_name = "FILE", requires = "cert")]
    pub(crate) key: Option<PathBuf>,

    /// Deadline in seconds for one card request before CardTimeout
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub(crate) card_timeout: u64,
}
