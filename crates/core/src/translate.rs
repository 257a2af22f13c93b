//! Scrambled-PIN command translation
//!
//! The portal never sends the PIN in the clear. Instead it fetches a
//! [`Reference`](crate::reference::Reference), XORs the PIN digits against
//! the reference key in the browser, and wraps the result in a
//! sentinel-prefixed pseudo-APDU:
//!
//! ```text
//! FF FF 01 04   sentinel
//! xx xx xx xx   reference id, big-endian
//! pp            length of the literal APDU prefix
//! nn            length of the scrambled PIN
//! <pp bytes>    literal prefix, copied through verbatim
//! <nn bytes>    scrambled PIN
//! <rest>        literal suffix, copied through verbatim
//! ```
//!
//! Anything not starting with the sentinel passes through unchanged.

use crate::error::Error;
use crate::reference::{KEY_LEN, ReferenceStore};

/// Marker prefix of a scrambled-PIN pseudo-APDU
pub const PIN_SENTINEL: [u8; 4] = [0xFF, 0xFF, 0x01, 0x04];

/// Fixed header length: sentinel, reference id, two length bytes
const HEADER_LEN: usize = 10;

/// Translate an inbound raw APDU into the bytes actually sent to the card
///
/// Non-sentinel commands are returned unchanged. Sentinel commands are
/// rebuilt with the PIN descrambled via the named reference:
/// `plain[i] = scrambled[i] ^ key[i] ^ key[i + pin_len]`.
pub fn translate(raw: &[u8], references: &ReferenceStore) -> Result<Vec<u8>, Error> {
    if raw.len() < PIN_SENTINEL.len() || raw[..PIN_SENTINEL.len()] != PIN_SENTINEL {
        return Ok(raw.to_vec());
    }

    if raw.len() < HEADER_LEN {
        return Err(Error::MalformedApdu("sentinel command shorter than header"));
    }

    // Big-endian 32-bit decode; the upstream implementation mangled this
    // with a mis-parenthesized running shift.
    let id = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
    let prefix_len = raw[8] as usize;
    let pin_len = raw[9] as usize;

    let pin_start = HEADER_LEN + prefix_len;
    let suffix_start = pin_start + pin_len;
    if suffix_start > raw.len() {
        return Err(Error::MalformedApdu("length bytes overrun the command"));
    }
    // The pad is consumed twice per PIN byte, so the key bounds the PIN length.
    if pin_len * 2 > KEY_LEN {
        return Err(Error::MalformedApdu("PIN too long for descrambling key"));
    }

    let key = references.lookup(id)?;
    let scrambled = &raw[pin_start..suffix_start];

    let mut out = Vec::with_capacity(raw.len() - HEADER_LEN);
    out.extend_from_slice(&raw[HEADER_LEN..pin_start]);
    out.extend(
        scrambled
            .iter()
            .enumerate()
            .map(|(i, byte)| byte ^ key[i] ^ key[i + pin_len]),
    );
    out.extend_from_slice(&raw[suffix_start..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentinel_command(id: u32, prefix: &[u8], scrambled: &[u8], suffix: &[u8]) -> Vec<u8> {
        let mut cmd = PIN_SENTINEL.to_vec();
        cmd.extend_from_slice(&id.to_be_bytes());
        cmd.push(prefix.len() as u8);
        cmd.push(scrambled.len() as u8);
        cmd.extend_from_slice(prefix);
        cmd.extend_from_slice(scrambled);
        cmd.extend_from_slice(suffix);
        cmd
    }

    #[test]
    fn test_non_sentinel_passes_through_unchanged() {
        let store = ReferenceStore::default();
        let apdu = [0x00, 0xA4, 0x04, 0x00, 0x02, 0x3F, 0x00];
        assert_eq!(translate(&apdu, &store).unwrap(), apdu.to_vec());

        // Near-miss prefixes are not the sentinel either
        let near = [0xFF, 0xFF, 0x01, 0x05, 0x00];
        assert_eq!(translate(&near, &store).unwrap(), near.to_vec());
    }

    #[test]
    fn test_short_commands_pass_through() {
        let store = ReferenceStore::default();
        let tiny = [0xFF, 0xFF];
        assert_eq!(translate(&tiny, &store).unwrap(), tiny.to_vec());
    }

    #[test]
    fn test_descramble_recovers_pin() {
        let mut store = ReferenceStore::default();
        let reference = store.create();

        // Scramble a PIN the way the browser does, then check the bridge
        // undoes it exactly.
        let pin = [0x31, 0x32, 0x33, 0x34];
        let pin_len = pin.len();
        let scrambled: Vec<u8> = pin
            .iter()
            .enumerate()
            .map(|(i, d)| d ^ reference.key[i] ^ reference.key[i + pin_len])
            .collect();

        let prefix = [0xA0, 0x20, 0x00, 0x82, 0x08];
        let suffix = [0xFF, 0xFF, 0xFF, 0xFF];
        let cmd = sentinel_command(reference.id, &prefix, &scrambled, &suffix);

        let out = translate(&cmd, &store).unwrap();
        let mut expected = prefix.to_vec();
        expected.extend_from_slice(&pin);
        expected.extend_from_slice(&suffix);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_descramble_concrete_xor_vector() {
        // key = 00 01 02 .. 0F, scrambled = 12 13 10 11, pinLen = 4:
        // plain[i] = scrambled[i] ^ key[i] ^ key[i + 4]
        let mut key = [0u8; KEY_LEN];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        let scrambled = [0x12, 0x13, 0x10, 0x11];
        let expected: Vec<u8> = scrambled
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i] ^ key[i + 4])
            .collect();
        // The second key byte for plain[i] is key[i + pinLen], so with
        // pinLen = 4 the pad pairs are (00,04), (01,05), (02,06), (03,07).
        assert_eq!(
            expected,
            vec![
                0x12 ^ 0x00 ^ 0x04,
                0x13 ^ 0x01 ^ 0x05,
                0x10 ^ 0x02 ^ 0x06,
                0x11 ^ 0x03 ^ 0x07,
            ]
        );

        // Cross-check through the full translation path with an issued key.
        let mut store = ReferenceStore::default();
        let reference = store.create();
        let prefix = [0xA0, 0x20, 0x00, 0x82, 0x08];
        let cmd = sentinel_command(reference.id, &prefix, &scrambled, &[]);
        let out = translate(&cmd, &store).unwrap();
        assert_eq!(&out[..prefix.len()], &prefix);
        for (i, b) in out[prefix.len()..].iter().enumerate() {
            assert_eq!(*b, scrambled[i] ^ reference.key[i] ^ reference.key[i + 4]);
        }
    }

    #[test]
    fn test_unknown_reference_is_reported() {
        let store = ReferenceStore::default();
        let cmd = sentinel_command(7, &[0xA0], &[0x00; 4], &[]);
        assert!(matches!(
            translate(&cmd, &store),
            Err(Error::ReferenceNotFound(7))
        ));
    }

    #[test]
    fn test_length_bytes_overrunning_buffer_are_malformed() {
        let mut store = ReferenceStore::default();
        let reference = store.create();
        let mut cmd = sentinel_command(reference.id, &[0xA0], &[0x00; 4], &[]);
        cmd[8] = 0xFF; // declared prefix longer than the remaining bytes
        assert!(matches!(
            translate(&cmd, &store),
            Err(Error::MalformedApdu(_))
        ));
    }

    #[test]
    fn test_pin_longer_than_half_key_is_malformed() {
        let mut store = ReferenceStore::default();
        let reference = store.create();
        let cmd = sentinel_command(reference.id, &[], &[0x00; 9], &[]);
        assert!(matches!(
            translate(&cmd, &store),
            Err(Error::MalformedApdu(_))
        ));
    }

    #[test]
    fn test_truncated_header_is_malformed() {
        let store = ReferenceStore::default();
        let cmd = [0xFF, 0xFF, 0x01, 0x04, 0x00, 0x00];
        assert!(matches!(
            translate(&cmd, &store),
            Err(Error::MalformedApdu(_))
        ));
    }

    #[test]
    fn test_arbitrary_prefix_and_pin_lengths() {
        let mut store = ReferenceStore::default();
        let reference = store.create();

        let pin = [0x31, 0x32, 0x33, 0x34, 0x35, 0x36];
        let pin_len = pin.len();
        let scrambled: Vec<u8> = pin
            .iter()
            .enumerate()
            .map(|(i, d)| d ^ reference.key[i] ^ reference.key[i + pin_len])
            .collect();

        let prefix = [0x00, 0x20];
        let cmd = sentinel_command(reference.id, &prefix, &scrambled, &[0x00]);
        let out = translate(&cmd, &store).unwrap();

        let mut expected = prefix.to_vec();
        expected.extend_from_slice(&pin);
        expected.push(0x00);
        assert_eq!(out, expected);
    }
}
