//! Length-delimited SSZ wire encoding, with optional snappy frame
//! compression.
//!
//! A message on the wire is `uvarint(len) || body`: the body is the SSZ
//! serialization of the message, compressed first when the negotiated
//! protocol carries the `/ssz_snappy` suffix, and `len` is the byte length
//! of the body as transmitted.

use bytes::{Buf, BytesMut};
use snap::read::FrameDecoder;
use snap::write::FrameEncoder;
use ssz::{Decode, DecodeError, Encode};
use std::io::{Cursor, Read, Write};
use tokio_util::codec::{Decoder, Encoder};
use unsigned_varint::codec::Uvi;

/// The default ceiling on a single message body.
pub const MAX_PACKET_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Ssz,
    SszSnappy,
}

#[derive(Debug)]
pub enum EncoderError {
    Io(std::io::Error),
    SszDecode(DecodeError),
    /// The message body exceeds the configured maximum packet size.
    PacketTooLarge { length: usize, max: usize },
}

impl From<std::io::Error> for EncoderError {
    fn from(e: std::io::Error) -> Self {
        EncoderError::Io(e)
    }
}

impl From<DecodeError> for EncoderError {
    fn from(e: DecodeError) -> Self {
        EncoderError::SszDecode(e)
    }
}

/// Encodes and decodes wire messages in one of the two negotiated modes.
pub struct NetworkEncoder {
    encoding: Encoding,
    /// Varint length-prefix codec.
    inner: Uvi<usize>,
    /// Body length parsed from the prefix of a partially received frame.
    len: Option<usize>,
    max_packet_size: usize,
}

impl NetworkEncoder {
    pub fn new(encoding: Encoding, max_packet_size: usize) -> Self {
        Self {
            encoding,
            inner: Uvi::default(),
            len: None,
            max_packet_size,
        }
    }

    pub fn ssz() -> Self {
        Self::new(Encoding::Ssz, MAX_PACKET_SIZE)
    }

    pub fn ssz_snappy() -> Self {
        Self::new(Encoding::SszSnappy, MAX_PACKET_SIZE)
    }

    /// The suffix appended to protocol IDs negotiating this encoding.
    pub fn protocol_suffix(&self) -> &'static str {
        match self.encoding {
            Encoding::Ssz => "/ssz",
            Encoding::SszSnappy => "/ssz_snappy",
        }
    }

    /// Serializes `item` into `dst`, length-prefixed and compressed
    /// according to the encoding mode.
    pub fn encode<T: Encode>(&mut self, item: &T, dst: &mut BytesMut) -> Result<(), EncoderError> {
        let bytes = item.as_ssz_bytes();

        let body = match self.encoding {
            Encoding::Ssz => bytes,
            Encoding::SszSnappy => {
                let mut writer = FrameEncoder::new(Vec::new());
                writer.write_all(&bytes)?;
                writer.flush()?;
                writer.into_inner().map_err(|e| e.into_error())?
            }
        };

        if body.len() > self.max_packet_size {
            return Err(EncoderError::PacketTooLarge {
                length: body.len(),
                max: self.max_packet_size,
            });
        }

        self.inner.encode(body.len(), dst)?;
        dst.extend_from_slice(&body);
        Ok(())
    }

    /// The mirror of [`NetworkEncoder::encode`]: reads the varint prefix,
    /// waits for that many body bytes, decompresses if applicable and
    /// deserializes into the expected message shape.
    ///
    /// Returns `Ok(None)` while the frame is still incomplete.
    pub fn decode<T: Decode>(&mut self, src: &mut BytesMut) -> Result<Option<T>, EncoderError> {
        let length = match self.len {
            Some(length) => length,
            None => match self.inner.decode(src)? {
                Some(length) => {
                    self.len = Some(length);
                    length
                }
                // Need more bytes to decode the length prefix.
                None => return Ok(None),
            },
        };

        if length > self.max_packet_size {
            return Err(EncoderError::PacketTooLarge {
                length,
                max: self.max_packet_size,
            });
        }

        if src.len() < length {
            // Need more bytes to decode the body.
            return Ok(None);
        }

        let body = src.copy_to_bytes(length);
        self.len = None;

        let decoded = match self.encoding {
            Encoding::Ssz => T::from_ssz_bytes(&body)?,
            Encoding::SszSnappy => {
                let mut reader = FrameDecoder::new(Cursor::new(&body[..]));
                let mut decompressed = Vec::new();
                reader.read_to_end(&mut decompressed)?;
                T::from_ssz_bytes(&decompressed)?
            }
        };
        Ok(Some(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{
        Attestation, AttestationData, BeaconBlock, BeaconBlockBody, BitList, Hash256,
        ProposerSlashing, Slot,
    };

    fn test_block() -> BeaconBlock {
        BeaconBlock {
            slot: Slot::new(42),
            parent_root: Hash256::repeat_byte(0x01),
            state_root: Hash256::repeat_byte(0x02),
            body: BeaconBlockBody {
                randao_reveal: Hash256::repeat_byte(0x03),
                graffiti: Hash256::repeat_byte(0x04),
            },
        }
    }

    fn test_attestation() -> Attestation {
        Attestation {
            aggregation_bits: BitList::with_capacity(16).unwrap(),
            data: AttestationData {
                slot: Slot::new(3),
                beacon_block_root: Hash256::repeat_byte(0x05),
                ..AttestationData::default()
            },
        }
    }

    fn round_trip<T: ssz::Encode + ssz::Decode + PartialEq + std::fmt::Debug>(
        encoder: &mut NetworkEncoder,
        item: &T,
    ) {
        let mut buffer = BytesMut::new();
        encoder.encode(item, &mut buffer).unwrap();
        let decoded: T = encoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&decoded, item);
        assert!(buffer.is_empty(), "frame fully consumed");
    }

    #[test]
    fn round_trips_without_compression() {
        let mut encoder = NetworkEncoder::ssz();
        round_trip(&mut encoder, &test_block());
        round_trip(&mut encoder, &test_attestation());
        round_trip(&mut encoder, &ProposerSlashing::default());
    }

    #[test]
    fn round_trips_with_compression() {
        let mut encoder = NetworkEncoder::ssz_snappy();
        round_trip(&mut encoder, &test_block());
        round_trip(&mut encoder, &test_attestation());
        round_trip(&mut encoder, &ProposerSlashing::default());
    }

    #[test]
    fn incomplete_frames_wait_for_more_bytes() {
        let mut encoder = NetworkEncoder::ssz();
        let mut full = BytesMut::new();
        encoder.encode(&test_block(), &mut full).unwrap();

        // Feed one byte at a time: the decoder returns `None` until the
        // whole frame has arrived.
        let mut partial = BytesMut::new();
        let mut decoded = None;
        for byte in full.iter() {
            partial.extend_from_slice(&[*byte]);
            if let Some(block) = encoder.decode::<BeaconBlock>(&mut partial).unwrap() {
                decoded = Some(block);
            }
        }
        assert_eq!(decoded.unwrap(), test_block());
    }

    #[test]
    fn consecutive_frames_decode_in_order() {
        let mut encoder = NetworkEncoder::ssz_snappy();
        let mut buffer = BytesMut::new();

        let first = test_block();
        let mut second = test_block();
        second.slot = Slot::new(43);

        encoder.encode(&first, &mut buffer).unwrap();
        encoder.encode(&second, &mut buffer).unwrap();

        assert_eq!(
            encoder.decode::<BeaconBlock>(&mut buffer).unwrap().unwrap(),
            first
        );
        assert_eq!(
            encoder.decode::<BeaconBlock>(&mut buffer).unwrap().unwrap(),
            second
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn oversize_packets_are_rejected() {
        let mut encoder = NetworkEncoder::new(Encoding::Ssz, 8);
        let mut buffer = BytesMut::new();
        assert!(matches!(
            encoder.encode(&test_block(), &mut buffer),
            Err(EncoderError::PacketTooLarge { .. })
        ));
    }

    #[test]
    fn protocol_suffixes() {
        assert_eq!(NetworkEncoder::ssz().protocol_suffix(), "/ssz");
        assert_eq!(
            NetworkEncoder::ssz_snappy().protocol_suffix(),
            "/ssz_snappy"
        );
    }

    #[test]
    fn corrupt_body_is_an_error() {
        let mut encoder = NetworkEncoder::ssz();

        // A well-formed frame whose body is not a valid block.
        let mut corrupt = BytesMut::new();
        corrupt.extend_from_slice(&[8]);
        corrupt.extend_from_slice(&[0xab; 8]);

        assert!(matches!(
            encoder.decode::<BeaconBlock>(&mut corrupt),
            Err(EncoderError::SszDecode(_))
        ));
    }
}
