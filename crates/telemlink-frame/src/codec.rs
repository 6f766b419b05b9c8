use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Byte that terminates every frame. Never appears inside a stuffed frame.
pub const DELIMITER: u8 = 0x00;

/// Upper bound on the wire size of a payload of `payload_len` bytes,
/// delimiter included: one code byte per started 254-byte run, plus the
/// delimiter.
pub fn max_encoded_len(payload_len: usize) -> usize {
    max_stuffed_len(payload_len) + 1
}

fn max_stuffed_len(payload_len: usize) -> usize {
    payload_len + payload_len / 254 + 1
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────────┬────────────┐
/// │ COBS-stuffed payload         │ Delimiter  │
/// │ (no 0x00 bytes)              │ 0x00       │
/// └──────────────────────────────┴────────────┘
/// ```
///
/// An empty payload is rejected with [`FrameError::Empty`]; it could never
/// be told apart from line noise on the receiving side.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.is_empty() {
        return Err(FrameError::Empty);
    }

    let start = dst.len();
    dst.resize(start + max_stuffed_len(payload.len()), 0);
    let written = cobs::encode(payload, &mut dst[start..]);
    dst.truncate(start + written);
    dst.put_u8(DELIMITER);
    Ok(())
}

/// Encode a payload into a freshly allocated wire frame.
pub fn encode_frame_to_vec(payload: &[u8]) -> Result<Vec<u8>> {
    let mut dst = BytesMut::with_capacity(max_encoded_len(payload.len()));
    encode_frame(payload, &mut dst)?;
    Ok(dst.to_vec())
}

/// Decode one delimited candidate (delimiter excluded) back into its payload.
///
/// Fails with [`FrameError::Malformed`] when a run-length byte points past the
/// end of the candidate or the candidate contains a delimiter, and with
/// [`FrameError::Empty`] when the payload has zero length.
pub fn decode_frame(candidate: &[u8]) -> Result<Bytes> {
    if candidate.is_empty() {
        return Err(FrameError::Empty);
    }
    if candidate.contains(&DELIMITER) {
        return Err(FrameError::Malformed {
            len: candidate.len(),
        });
    }

    let payload = cobs::decode_vec(candidate).map_err(|_| FrameError::Malformed {
        len: candidate.len(),
    })?;
    if payload.is_empty() {
        return Err(FrameError::Empty);
    }

    Ok(Bytes::from(payload))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn encode_appends_single_delimiter() {
        let wire = encode_frame_to_vec(b"\x11\x22\x00\x33").unwrap();
        assert_eq!(wire, vec![0x03, 0x11, 0x22, 0x02, 0x33, 0x00]);
        assert_eq!(wire.iter().filter(|b| **b == DELIMITER).count(), 1);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let payload = [1.0f32, 2.0, 3.0]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect::<Vec<u8>>();

        let wire = encode_frame_to_vec(&payload).unwrap();
        let (delimiter, stuffed) = wire.split_last().unwrap();
        assert_eq!(*delimiter, DELIMITER);

        let decoded = decode_frame(stuffed).unwrap();
        assert_eq!(decoded.as_ref(), payload.as_slice());
    }

    #[test]
    fn encode_appends_to_existing_buffer() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf).unwrap();
        let first_len = buf.len();
        encode_frame(b"second", &mut buf).unwrap();

        assert_eq!(buf[first_len - 1], DELIMITER);
        assert_eq!(buf.last(), Some(&DELIMITER));
        assert_eq!(
            decode_frame(&buf[..first_len - 1]).unwrap().as_ref(),
            b"first"
        );
        assert_eq!(
            decode_frame(&buf[first_len..buf.len() - 1]).unwrap().as_ref(),
            b"second"
        );
    }

    #[test]
    fn long_runs_use_extra_overhead_bytes() {
        let payload = vec![0xAB; 600];
        let wire = encode_frame_to_vec(&payload).unwrap();
        assert!(wire.len() <= max_encoded_len(payload.len()));
        assert!(!wire[..wire.len() - 1].contains(&DELIMITER));
        assert_eq!(
            decode_frame(&wire[..wire.len() - 1]).unwrap().as_ref(),
            payload.as_slice()
        );
    }

    #[test]
    fn empty_payload_is_rejected_both_ways() {
        assert_eq!(encode_frame_to_vec(b""), Err(FrameError::Empty));
        assert_eq!(decode_frame(&[]), Err(FrameError::Empty));
        // A lone code byte stuffs nothing.
        assert_eq!(decode_frame(&[0x01]), Err(FrameError::Empty));
    }

    #[test]
    fn run_past_end_is_malformed() {
        let err = decode_frame(&[0x05, 0x11, 0x22]).unwrap_err();
        assert_eq!(err, FrameError::Malformed { len: 3 });
    }

    #[test]
    fn embedded_delimiter_is_malformed() {
        let err = decode_frame(&[0x02, 0x11, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, FrameError::Malformed { .. }));
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let wire = encode_frame_to_vec(b"telemetry").unwrap();
        let err = decode_frame(&wire[..4]).unwrap_err();
        assert!(matches!(err, FrameError::Malformed { .. }));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(payload in proptest::collection::vec(any::<u8>(), 1..1024)) {
            let wire = encode_frame_to_vec(&payload).unwrap();
            prop_assert!(wire.len() <= max_encoded_len(payload.len()));
            prop_assert_eq!(wire.iter().position(|b| *b == DELIMITER), Some(wire.len() - 1));
            let decoded = decode_frame(&wire[..wire.len() - 1]).unwrap();
            prop_assert_eq!(decoded.as_ref(), payload.as_slice());
        }
    }
}
