//! Wire types and error mapping for the portal's JSON protocol
//!
//! Field names and shapes follow what the identity portal already speaks;
//! they are the compatibility contract and must not be renamed.

use hyper::StatusCode;
use scbridge_core::Error;
use serde::{Deserialize, Serialize};

/// `cardstatus` value the portal recognizes as "card present"
pub(crate) const CARD_PRESENT: u32 = 302;
/// `cardstatus` value the portal recognizes as "no card"
pub(crate) const NO_CARD: u32 = 301;

/// Response for `/scard/version/`
#[derive(Debug, Serialize)]
pub(crate) struct VersionResponse {
    pub(crate) version: &'static str,
    pub(crate) port: u16,
}

/// One reader entry in the list response
#[derive(Debug, Serialize)]
pub(crate) struct ReaderEntry {
    pub(crate) cardstatus: u32,
    pub(crate) name: String,
}

/// Response for `/scard/list/`
#[derive(Debug, Serialize)]
pub(crate) struct ListResponse {
    pub(crate) readers: Vec<ReaderEntry>,
    pub(crate) errorcode: u32,
    pub(crate) errordetail: u32,
}

/// Response for `/scard/getref/`: reference id plus hex-encoded 16-byte key
#[derive(Debug, Serialize)]
pub(crate) struct RefResponse {
    #[serde(rename = "ref")]
    pub(crate) id: u32,
    pub(crate) data: String,
}

/// One hex APDU in a command or response list
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ApduEntry {
    pub(crate) apdu: String,
}

/// Request body for `/scard/apdu/<reader>`
#[derive(Debug, Deserialize)]
pub(crate) struct ApduRequest {
    pub(crate) session: String,
    pub(crate) apducommands: Vec<ApduEntry>,
}

/// Response body for `/scard/apdu/<reader>`
#[derive(Debug, Serialize)]
pub(crate) struct ApduResponses {
    pub(crate) apduresponses: Vec<ApduEntry>,
    pub(crate) errorcode: u32,
    pub(crate) errordetail: u32,
}

/// Request body for `/scard/disconnect/`
#[derive(Debug, Deserialize)]
pub(crate) struct DisconnectRequest {
    pub(crate) session: String,
}

/// Structured failure body; `errorcode` disambiguates for the portal,
/// `errordetail` is human-readable
#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) errorcode: u32,
    pub(crate) errordetail: String,
}

/// Map a core error onto an HTTP status and portal error code
pub(crate) fn error_mapping(err: &Error) -> (StatusCode, u32) {
    match err {
        Error::MalformedApdu(_) => (StatusCode::BAD_REQUEST, 1),
        Error::ReferenceNotFound(_) => (StatusCode::BAD_REQUEST, 2),
        Error::SessionNotFound(_) => (StatusCode::NOT_FOUND, 3),
        Error::ReaderUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, 4),
        Error::CardTimeout => (StatusCode::GATEWAY_TIMEOUT, 5),
        Error::TruncatedResponse(_) | Error::Transport(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, 6)
        }
    }
}
