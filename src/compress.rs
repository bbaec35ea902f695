//! Compressed frame support
//!
//! Senders wrap a whole frame in zlib and prefix it with a
//! [`CompressedEnvelope`]. The session only needs the [`Decompressor`]
//! trait; [`ZlibDecompressor`] is the implementation the server ships with.

use std::io::Write;

use bytes::{BufMut, BytesMut};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::network::wire::{CompressedEnvelope, COMPRESSED_HEADER_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum DecompressError {
    #[error("zlib error: {0}")]
    Codec(#[from] flate2::DecompressError),

    #[error("stream ended after {produced} bytes, expected {expected}")]
    SizeMismatch { expected: usize, produced: usize },

    #[error("stream did not end within {expected} bytes")]
    Overflow { expected: usize },
}

/// Expands a compressed payload into a caller-provided buffer.
///
/// `dst.len()` is the expected expanded size; anything else is an error.
pub trait Decompressor: Send {
    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(), DecompressError>;
}

/// zlib-wrapped deflate, as produced by the standard sender tools.
#[derive(Default)]
pub struct ZlibDecompressor;

impl Decompressor for ZlibDecompressor {
    fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(), DecompressError> {
        let expected = dst.len();
        let mut inflater = Decompress::new(true);
        let status = inflater.decompress(src, dst, FlushDecompress::Finish)?;
        let produced = inflater.total_out() as usize;

        match status {
            Status::StreamEnd if produced == expected => Ok(()),
            Status::StreamEnd => Err(DecompressError::SizeMismatch { expected, produced }),
            _ if produced == expected => Err(DecompressError::Overflow { expected }),
            _ => Err(DecompressError::SizeMismatch { expected, produced }),
        }
    }
}

/// Wrap `frame` in a compressed envelope.
pub fn encode_compressed_frame(frame: &[u8]) -> std::io::Result<BytesMut> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(frame)?;
    let body = encoder.finish()?;

    let envelope = CompressedEnvelope {
        compressed_size: body.len() as u32,
        expanded_size: frame.len() as u32,
        reserved: 0,
    };
    let mut out = BytesMut::with_capacity(COMPRESSED_HEADER_SIZE + body.len());
    envelope.encode(&mut out);
    out.put_slice(&body);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::wire::encode_pixel_frame;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_zlib_expands_exact_size() {
        let data: Vec<u8> = (0..600u32).map(|i| (i % 7) as u8).collect();
        let compressed = zlib(&data);
        let mut out = vec![0u8; data.len()];
        ZlibDecompressor.decompress(&compressed, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_zlib_expected_size_too_large() {
        let compressed = zlib(&[1, 2, 3, 4]);
        let mut out = vec![0u8; 10];
        let err = ZlibDecompressor.decompress(&compressed, &mut out).unwrap_err();
        assert!(matches!(err, DecompressError::SizeMismatch { expected: 10, produced: 4 }));
    }

    #[test]
    fn test_zlib_expected_size_too_small() {
        let compressed = zlib(&[5u8; 64]);
        let mut out = vec![0u8; 32];
        let err = ZlibDecompressor.decompress(&compressed, &mut out).unwrap_err();
        assert!(matches!(err, DecompressError::Overflow { expected: 32 }));
    }

    #[test]
    fn test_zlib_garbage_input() {
        let mut out = vec![0u8; 16];
        let result = ZlibDecompressor.decompress(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00], &mut out);
        assert!(result.is_err());
    }

    #[test]
    fn test_zlib_truncated_input() {
        let data = vec![42u8; 256];
        let compressed = zlib(&data);
        let mut out = vec![0u8; data.len()];
        let result = ZlibDecompressor.decompress(&compressed[..compressed.len() / 2], &mut out);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_compressed_frame_envelope() {
        let frame = encode_pixel_frame(0, 1, 2, &[7u8; 300]);
        let packet = encode_compressed_frame(&frame).unwrap();

        let envelope = CompressedEnvelope::parse(&packet).unwrap();
        assert_eq!(envelope.expanded_size as usize, frame.len());
        assert_eq!(
            envelope.compressed_size as usize,
            packet.len() - COMPRESSED_HEADER_SIZE
        );

        let mut out = vec![0u8; frame.len()];
        ZlibDecompressor
            .decompress(&packet[COMPRESSED_HEADER_SIZE..], &mut out)
            .unwrap();
        assert_eq!(&out[..], &frame[..]);
    }
}
