//! Property tests for the hand-rolled control-frame codec.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use roomcast_proto::control::{ControlFrame, FrameError, HEADER_LEN};

proptest! {
    /// Any frame with an encodable room name survives a round trip, and the
    /// decoder reports exactly the bytes it consumed.
    #[test]
    fn round_trip(
        room in "[a-zA-Z0-9 ._-]{0,255}",
        op in any::<u8>(),
        payload in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let frame = ControlFrame { room, op, payload };
        let bytes = frame.encode().unwrap();
        prop_assert_eq!(bytes.len(), HEADER_LEN + frame.room.len() + frame.payload.len());

        let (decoded, consumed) = ControlFrame::decode(&bytes).unwrap();
        prop_assert_eq!(consumed, bytes.len());
        prop_assert_eq!(decoded, frame);
    }

    /// Decoding arbitrary bytes never panics; it either yields a frame or a
    /// structured error.
    #[test]
    fn decode_arbitrary_bytes_never_panics(
        bytes in proptest::collection::vec(any::<u8>(), 0..1024),
    ) {
        let _ = ControlFrame::decode(&bytes);
    }

    /// Every strict prefix of a valid frame decodes to `Truncated`.
    #[test]
    fn prefixes_report_truncation(
        room in "[a-z]{1,20}",
        payload in proptest::collection::vec(any::<u8>(), 1..64),
        cut in 0usize..10,
    ) {
        let frame = ControlFrame { room, op: 1, payload };
        let bytes = frame.encode().unwrap();
        let cut = cut.min(bytes.len() - 1);
        let result = ControlFrame::decode(&bytes[..bytes.len() - 1 - cut]);
        prop_assert!(
            matches!(result, Err(FrameError::Truncated { .. })),
            "expected Truncated, got {:?}",
            result
        );
    }

    /// Room names longer than the one-byte length field are refused.
    #[test]
    fn oversized_room_names_refused(extra in 1usize..64) {
        let frame = ControlFrame {
            room: "x".repeat(255 + extra),
            op: 1,
            payload: Vec::new(),
        };
        prop_assert!(matches!(frame.encode(), Err(FrameError::RoomNameTooLong(_))));
    }
}
