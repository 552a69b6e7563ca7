//! Frame encoding and decoding.
//!
//! A frame carries a batch of one or more PDUs:
//!
//! ```text
//! +---------+-----------------+------------------------------+
//! | Version | Count           | Records                      |
//! | 1 byte  | 2 bytes (LE16)  | Count x record               |
//! +---------+-----------------+------------------------------+
//!
//! record (37 byte header + payload):
//! +------+----------+-----------+--------+---------+--------+-------------+---------+
//! | Type | Src addr | Dest addr | Src id | Dest id | Seq no | Payload len | Payload |
//! | 1    | 8 (LE64) | 8 (LE64)  | 4 (LE) | 4 (LE)  | 8 (LE) | 4 (LE32)    | len     |
//! +------+----------+-----------+--------+---------+--------+-------------+---------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::{
    Codec, DecodeError, FRAME_HEADER_SIZE, FRAME_VERSION, PDU_RECORD_HEADER_SIZE,
};
use crate::pdu::{Pdu, PduType};

/// The default [`Codec`]: fixed little-endian records.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a codec.
    pub fn new() -> Self {
        Self
    }

    /// Encoded size of a batch.
    pub fn encoded_len(pdus: &[Pdu]) -> usize {
        FRAME_HEADER_SIZE
            + pdus
                .iter()
                .map(|pdu| PDU_RECORD_HEADER_SIZE + pdu.payload.len())
                .sum::<usize>()
    }
}

impl Codec for FrameCodec {
    fn encode(&self, pdus: &[Pdu]) -> Result<Bytes, DecodeError> {
        if pdus.is_empty() {
            return Err(DecodeError::EmptyFrame);
        }
        let count = u16::try_from(pdus.len()).map_err(|_| DecodeError::TooManyPdus)?;

        let mut buf = BytesMut::with_capacity(Self::encoded_len(pdus));
        buf.put_u8(FRAME_VERSION);
        buf.put_u16_le(count);

        for pdu in pdus {
            let len = u32::try_from(pdu.payload.len()).map_err(|_| DecodeError::PayloadTooLarge)?;
            buf.put_u8(pdu.pdu_type.as_byte());
            buf.put_u64_le(pdu.src_addr);
            buf.put_u64_le(pdu.dest_addr);
            buf.put_u32_le(pdu.src_id);
            buf.put_u32_le(pdu.dest_id);
            buf.put_u64_le(pdu.seq_no);
            buf.put_u32_le(len);
            buf.put_slice(&pdu.payload);
        }

        Ok(buf.freeze())
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<Pdu>, DecodeError> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(DecodeError::TooShort {
                expected: FRAME_HEADER_SIZE,
                actual: data.len(),
            });
        }
        if data[0] != FRAME_VERSION {
            return Err(DecodeError::UnsupportedVersion(data[0]));
        }
        let count = u16::from_le_bytes([data[1], data[2]]) as usize;
        if count == 0 {
            return Err(DecodeError::EmptyFrame);
        }

        let mut pdus = Vec::with_capacity(count);
        let mut rest = &data[FRAME_HEADER_SIZE..];
        for _ in 0..count {
            let (pdu, tail) = decode_record(rest)?;
            pdus.push(pdu);
            rest = tail;
        }

        if !rest.is_empty() {
            return Err(DecodeError::TrailingBytes(rest.len()));
        }
        Ok(pdus)
    }
}

fn decode_record(bytes: &[u8]) -> Result<(Pdu, &[u8]), DecodeError> {
    if bytes.len() < PDU_RECORD_HEADER_SIZE {
        return Err(DecodeError::TooShort {
            expected: PDU_RECORD_HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let pdu_type = PduType::from_byte(bytes[0]).ok_or(DecodeError::InvalidType(bytes[0]))?;
    let src_addr = read_u64(&bytes[1..9]);
    let dest_addr = read_u64(&bytes[9..17]);
    let src_id = read_u32(&bytes[17..21]);
    let dest_id = read_u32(&bytes[21..25]);
    let seq_no = read_u64(&bytes[25..33]);
    let len = read_u32(&bytes[33..37]) as usize;

    let end = PDU_RECORD_HEADER_SIZE + len;
    if bytes.len() < end {
        return Err(DecodeError::TooShort {
            expected: end,
            actual: bytes.len(),
        });
    }

    let pdu = Pdu {
        src_id,
        dest_id,
        src_addr,
        dest_addr,
        pdu_type,
        seq_no,
        payload: Bytes::copy_from_slice(&bytes[PDU_RECORD_HEADER_SIZE..end]),
    };
    Ok((pdu, &bytes[end..]))
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
