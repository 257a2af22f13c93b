//! Status-word-driven card exchange
//!
//! One logical exchange sends an APDU and normalizes the card's answer into
//! the bytes the portal expects:
//!
//! 1. `61 xx` ("more data"): issue one `00 C0 00 00 xx` GET RESPONSE and
//!    return the follow-up's payload; the original status bytes are dropped.
//! 2. Non-empty payload and the outbound APDU ended in byte `2`: append the
//!    status bytes to the payload. Compatibility shim for a caller that
//!    explicitly asked for a 2-byte response, not a general protocol rule.
//! 3. Non-empty payload otherwise: payload alone, status dropped.
//! 4. Empty payload: the two status bytes alone.

use bytes::Bytes;
use tracing::trace;

use crate::error::Error;
use crate::status::StatusWord;
use crate::transport::CardTransport;

/// CLA/INS/P1/P2 of the GET RESPONSE follow-up; Le is the announced length
const GET_RESPONSE: [u8; 4] = [0x00, 0xC0, 0x00, 0x00];

/// Split a raw card response into payload and status word
fn split_response(raw: &Bytes) -> Result<(Bytes, StatusWord), Error> {
    if raw.len() < 2 {
        return Err(Error::TruncatedResponse(raw.len()));
    }
    let status = StatusWord::new(raw[raw.len() - 2], raw[raw.len() - 1]);
    Ok((raw.slice(..raw.len() - 2), status))
}

/// Send `apdu` to the card and return the normalized response bytes
pub fn exchange(transport: &mut dyn CardTransport, apdu: &[u8]) -> Result<Bytes, Error> {
    let raw = transport.transmit(apdu)?;
    let (payload, status) = split_response(&raw)?;
    trace!(%status, payload_len = payload.len(), "card answered");

    if let Some(remaining) = status.remaining_bytes() {
        let mut follow_up = GET_RESPONSE.to_vec();
        follow_up.push(remaining);
        let raw = transport.transmit(&follow_up)?;
        let (payload, _) = split_response(&raw)?;
        return Ok(payload);
    }

    if !payload.is_empty() && apdu.last() == Some(&2) {
        let mut out = payload.to_vec();
        out.push(status.sw1);
        out.push(status.sw2);
        return Ok(Bytes::from(out));
    }

    if !payload.is_empty() {
        return Ok(payload);
    }

    Ok(Bytes::from(vec![status.sw1, status.sw2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn test_more_data_triggers_single_get_response() {
        let mut transport = MockTransport::new(vec![
            Bytes::from_static(&[0x61, 0x05]),
            Bytes::from_static(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x90, 0x00]),
        ]);

        let out = exchange(&mut transport, &[0x00, 0xA4, 0x04, 0x00]).unwrap();
        assert_eq!(out.as_ref(), &[0x01, 0x02, 0x03, 0x04, 0x05]);

        // Exactly one follow-up, with Le taken from SW2
        assert_eq!(transport.commands.len(), 2);
        assert_eq!(transport.commands[1].as_ref(), &[0x00, 0xC0, 0x00, 0x00, 0x05]);
    }

    #[test]
    fn test_more_data_result_is_follow_up_payload_not_status() {
        let mut transport = MockTransport::new(vec![
            Bytes::from_static(&[0x61, 0x05]),
            Bytes::from_static(&[0xAA, 0x90, 0x00]),
        ]);
        let out = exchange(&mut transport, &[0x00, 0xB0, 0x00, 0x00]).unwrap();
        assert_eq!(out.as_ref(), &[0xAA]);
    }

    #[test]
    fn test_status_appended_when_request_ends_in_two() {
        let mut transport =
            MockTransport::with_response(&[0xDE, 0xAD, 0x90, 0x00]);
        let out = exchange(&mut transport, &[0x00, 0xB0, 0x00, 0x00, 0x02]).unwrap();
        assert_eq!(out.as_ref(), &[0xDE, 0xAD, 0x90, 0x00]);
    }

    #[test]
    fn test_status_only_when_payload_empty_even_if_request_ends_in_two() {
        // Rule 3 needs a non-empty payload; with none, the status bytes alone
        // come back.
        let mut transport = MockTransport::with_response(&[0x90, 0x00]);
        let out = exchange(&mut transport, &[0x00, 0xB0, 0x00, 0x00, 0x02]).unwrap();
        assert_eq!(out.as_ref(), &[0x90, 0x00]);
    }

    #[test]
    fn test_payload_alone_for_ordinary_requests() {
        let mut transport =
            MockTransport::with_response(&[0xCA, 0xFE, 0x90, 0x00]);
        let out = exchange(&mut transport, &[0x00, 0xB0, 0x00, 0x00]).unwrap();
        assert_eq!(out.as_ref(), &[0xCA, 0xFE]);
    }

    #[test]
    fn test_error_status_without_payload_is_returned_as_is() {
        let mut transport = MockTransport::with_response(&[0x69, 0x82]);
        let out = exchange(&mut transport, &[0x00, 0x20, 0x00, 0x82]).unwrap();
        assert_eq!(out.as_ref(), &[0x69, 0x82]);
    }

    #[test]
    fn test_single_byte_response_is_truncated() {
        let mut transport = MockTransport::with_response(&[0x90]);
        assert!(matches!(
            exchange(&mut transport, &[0x00, 0xB0, 0x00, 0x00]),
            Err(Error::TruncatedResponse(1))
        ));
    }
}
