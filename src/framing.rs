//! Incremental reassembly of `Bin` frames from a byte stream.

use byteorder::{BigEndian, ByteOrder};
use bytes::{Bytes, BytesMut};

use crate::{
    errors::Error,
    message::{FLAG_HEADER, FLAG_RESPONSE},
};

/// Headers larger than this are rejected before any space is reserved.
const MAX_HEADER_SIZE: u64 = 10 * 1024 * 1024;

/// Frames whose post-prefix span is larger than this are rejected before
/// any space is reserved.
const MAX_DATA_SIZE: u64 = 100 * 1024 * 1024;

/// The direction of a reassembled frame, from bit 0 of the flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameKind {
    /// The frame type has not been determined yet.
    #[default]
    Unknown,
    /// The peer is invoking a method on us.
    Request,
    /// The peer is answering one of our requests.
    Response,
}

/// Reassembles one frame at a time from arbitrarily sized byte chunks.
///
/// Feed chunks through [`process`](Self::process) until
/// [`is_finished`](Self::is_finished) reports a complete frame, then take
/// the frame and [`reset`](Self::reset) before feeding the remaining
/// bytes - a chunk may end with the start of the next frame, in which case
/// `process` consumes only the bytes belonging to the current one.
///
/// ```
/// use bin_ipc::{Encoder, FrameAssembler, FrameKind, Value};
///
/// let wire = Encoder::new().encode_response(&Value::Int32(7));
///
/// let mut assembler = FrameAssembler::new();
/// let consumed = assembler.process(&wire).unwrap();
/// assert_eq!(consumed, wire.len());
/// assert!(assembler.is_finished());
/// assert_eq!(assembler.kind(), FrameKind::Response);
/// ```
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    kind: FrameKind,
    header_size: u64,
    data_size: u64,
    has_header: bool,
    started: bool,
    finished: bool,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// A fresh assembler with no buffered bytes.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
            kind: FrameKind::Unknown,
            header_size: 0,
            data_size: 0,
            has_header: false,
            started: false,
            finished: false,
        }
    }

    /// Consume bytes from `input`, returning how many were used.
    ///
    /// The return value is less than `input.len()` only when the frame
    /// completed partway through the chunk; the caller owns the rest and
    /// must feed it again after [`reset`](Self::reset). A finished
    /// assembler consumes nothing until reset.
    ///
    /// Errors leave the assembler in need of a reset; the declared sizes
    /// of an oversize frame are never allocated.
    pub fn process(&mut self, input: &[u8]) -> Result<usize, Error> {
        let initial = input.len();
        if input.is_empty() || self.finished {
            return Ok(0);
        }
        self.started = true;

        // Buffer the 8-byte prefix before interpreting anything.
        let mut rest = input;
        if self.buf.len() + rest.len() < 8 {
            self.buf.extend_from_slice(rest);
            return Ok(initial);
        }
        if self.buf.len() < 8 {
            let take = 8 - self.buf.len();
            self.buf.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
        }

        if &self.buf[..3] != b"Bin" {
            self.finished = true;
            return Err(Error::InvalidPrefix);
        }
        self.kind = if self.buf[3] & FLAG_RESPONSE != 0 {
            FrameKind::Response
        } else {
            FrameKind::Request
        };
        if self.buf[3] & FLAG_HEADER != 0 {
            self.has_header = true;
            self.header_size = u64::from(read_u32(&self.buf[4..8]));
            if self.header_size > MAX_HEADER_SIZE {
                return Err(Error::HeaderTooLarge(self.header_size));
            }
        } else {
            self.data_size = u64::from(read_u32(&self.buf[4..8]));
            if self.data_size > MAX_DATA_SIZE {
                return Err(Error::PayloadTooLarge(self.data_size));
            }
        }
        if self.data_size == 0 && self.header_size == 0 {
            self.finished = true;
            return Err(Error::EmptyFrame);
        }

        // With a header present the payload length word sits behind the
        // header block, so the total span is not known until the block and
        // the word are buffered.
        if self.data_size == 0 {
            let need = 8 + self.header_size as usize + 4;
            if self.buf.len() + rest.len() < need {
                self.buf.reserve(need + 1024 - self.buf.len());
                self.buf.extend_from_slice(rest);
                return Ok(initial);
            }
            if self.buf.len() < need {
                let take = need - self.buf.len();
                self.buf.extend_from_slice(&rest[..take]);
                rest = &rest[take..];
            }
            let payload_len = u64::from(read_u32(&self.buf[8 + self.header_size as usize..]));
            // Widened arithmetic: a 32-bit length that would wrap once the
            // header span and its length word are added is rejected by the
            // cap below, not silently truncated.
            self.data_size = payload_len + self.header_size + 4;
            if self.data_size > MAX_DATA_SIZE {
                return Err(Error::PayloadTooLarge(self.data_size));
            }
        }

        let total = 8 + self.data_size as usize;
        self.buf.reserve(total - self.buf.len());
        if self.buf.len() + rest.len() < total {
            self.buf.extend_from_slice(rest);
            return Ok(initial);
        }
        let take = total - self.buf.len();
        self.buf.extend_from_slice(&rest[..take]);
        rest = &rest[take..];

        self.finished = true;
        Ok(initial - rest.len())
    }

    /// Returns true once a complete frame is buffered.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns true once any byte of the current frame has been consumed.
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// The kind of the frame being assembled, known from the 8th byte
    /// onwards.
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Whether the frame being assembled carries a header block.
    pub fn has_header(&self) -> bool {
        self.has_header
    }

    /// The buffered frame bytes (prefix, optional header, and however much
    /// of the payload has arrived).
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Take the completed frame out of the assembler.
    ///
    /// The assembler still requires a [`reset`](Self::reset) before it can
    /// process the next frame.
    pub fn take_frame(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Clear all state for the next frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.kind = FrameKind::Unknown;
        self.header_size = 0;
        self.data_size = 0;
        self.has_header = false;
        self.started = false;
        self.finished = false;
    }
}

fn read_u32(buf: &[u8]) -> u32 {
    BigEndian::read_u32(buf)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;
    use crate::{message::Encoder, value::Value};

    /// Feed `wire` in chunks of `step` bytes, collecting completed frames.
    fn assemble_chunked(wire: &[u8], step: usize) -> Vec<(FrameKind, Bytes)> {
        let mut assembler = FrameAssembler::new();
        let mut frames = Vec::new();
        for chunk in wire.chunks(step) {
            let mut offset = 0;
            while offset < chunk.len() {
                offset += assembler.process(&chunk[offset..]).expect("valid frame");
                if assembler.is_finished() {
                    frames.push((assembler.kind(), assembler.take_frame()));
                    assembler.reset();
                }
            }
        }
        frames
    }

    #[test]
    fn test_single_frame() {
        let wire = Encoder::new().encode_request("ping", &[], None);

        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.process(&wire).unwrap(), wire.len());
        assert!(assembler.is_finished());
        assert!(!assembler.has_header());
        assert_eq!(assembler.kind(), FrameKind::Request);
        assert_eq!(assembler.take_frame(), wire);
    }

    #[test]
    fn test_empty_input_is_a_no_op() {
        let mut assembler = FrameAssembler::new();

        assert_eq!(assembler.process(&[]).unwrap(), 0);
        assert!(!assembler.has_started());
    }

    #[test]
    fn test_byte_at_a_time_matches_whole_feed() {
        let mut wire = Encoder::new().encode_request("ping", &[Value::Int32(1)], None);
        wire.extend(Encoder::new().encode_response(&Value::Bool(true)));

        let whole = assemble_chunked(&wire, wire.len());
        let single = assemble_chunked(&wire, 1);

        assert_eq!(whole.len(), 2);
        assert_eq!(whole, single);
        assert_eq!(whole[0].0, FrameKind::Request);
        assert_eq!(whole[1].0, FrameKind::Response);
    }

    #[test]
    fn test_chunk_spanning_two_frames() {
        let first = Encoder::new().encode_response(&Value::Int32(1));
        let second = Encoder::new().encode_response(&Value::Int32(2));
        let mut wire = first.clone();
        wire.extend_from_slice(&second);

        let mut assembler = FrameAssembler::new();
        let consumed = assembler.process(&wire).unwrap();

        // Only the first frame's bytes are consumed.
        assert_eq!(consumed, first.len());
        assert!(assembler.is_finished());
        assert_eq!(assembler.take_frame(), first);

        assembler.reset();
        assert_eq!(assembler.process(&wire[consumed..]).unwrap(), second.len());
        assert_eq!(assembler.take_frame(), second);
    }

    #[test]
    fn test_frame_with_header() {
        let header = crate::Header::with_authorization("token");
        let wire = Encoder::new().encode_request("ping", &[], Some(&header));

        let mut assembler = FrameAssembler::new();
        assembler.process(&wire).unwrap();
        assert!(assembler.has_header());

        for step in [1, 3, wire.len()] {
            let frames = assemble_chunked(&wire, step);
            assert_eq!(frames.len(), 1, "step {}", step);
            assert_eq!(crate::decode_header(&frames[0].1), header);
        }
    }

    #[test]
    fn test_invalid_prefix() {
        let mut assembler = FrameAssembler::new();

        let err = assembler.process(b"NotBinAtAll").unwrap_err();
        assert_eq!(err, Error::InvalidPrefix);

        // Finished-with-error: nothing more is consumed until reset.
        assert_eq!(assembler.process(b"Bin").unwrap(), 0);
        assembler.reset();
        let wire = Encoder::new().encode_request("ping", &[], None);
        assert_eq!(assembler.process(&wire).unwrap(), wire.len());
    }

    #[test]
    fn test_oversize_header_rejected_without_buffering() {
        // 11 MiB declared header.
        let wire = hex!("42696e40 00b00000");

        let mut assembler = FrameAssembler::new();
        let err = assembler.process(&wire).unwrap_err();
        assert_eq!(err, Error::HeaderTooLarge(11 * 1024 * 1024));
        assert!(assembler.data().len() <= 8);
    }

    #[test]
    fn test_oversize_payload_rejected_without_buffering() {
        // 101 MiB declared payload.
        let wire = hex!("42696e00 06500000");

        let mut assembler = FrameAssembler::new();
        let err = assembler.process(&wire).unwrap_err();
        assert_eq!(err, Error::PayloadTooLarge(101 * 1024 * 1024));
        assert!(assembler.data().len() <= 8);
    }

    #[test]
    fn test_overflowing_payload_length_rejected() {
        // A payload length word of 0xFFFFFFFF behind a 4-byte header block
        // must not wrap when the header span is added.
        let mut wire = hex!("42696e40 00000004 00000000").to_vec();
        wire.extend_from_slice(&hex!("ffffffff"));

        let mut assembler = FrameAssembler::new();
        let err = assembler.process(&wire).unwrap_err();
        assert_eq!(err, Error::PayloadTooLarge(u64::from(u32::MAX) + 8));
    }

    #[test]
    fn test_zero_zero_sizes_rejected() {
        let wire = hex!("42696e00 00000000");

        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.process(&wire).unwrap_err(), Error::EmptyFrame);
    }

    #[test]
    fn test_reset_allows_reuse() {
        let wire = Encoder::new().encode_response(&Value::Int32(1));

        let mut assembler = FrameAssembler::new();
        assembler.process(&wire).unwrap();
        assert!(assembler.is_finished());

        assembler.reset();
        assert!(!assembler.is_finished());
        assert!(!assembler.has_started());
        assert_eq!(assembler.kind(), FrameKind::Unknown);
        assert_eq!(assembler.process(&wire).unwrap(), wire.len());
    }

    proptest! {
        #[test]
        fn prop_any_partition_yields_the_same_frames(
            values in prop::collection::vec(any::<i32>().prop_map(Value::Int32), 1..4),
            step in 1usize..64,
        ) {
            let mut wire = Vec::new();
            for v in &values {
                wire.extend(Encoder::new().encode_response(v));
            }

            let whole = assemble_chunked(&wire, wire.len());
            let chunked = assemble_chunked(&wire, step);

            prop_assert_eq!(whole.len(), values.len());
            prop_assert_eq!(whole, chunked);
        }

        #[test]
        fn prop_consumed_bytes_are_monotonic(step in 1usize..16) {
            let wire = Encoder::new().encode_request("ping", &[Value::Int32(1)], None);

            let mut assembler = FrameAssembler::new();
            let mut total = 0;
            for chunk in wire.chunks(step) {
                let consumed = assembler.process(chunk).unwrap();
                prop_assert!(consumed <= chunk.len());
                total += consumed;
            }
            prop_assert_eq!(total, wire.len());
            prop_assert!(assembler.is_finished());
        }
    }
}
