//! Ingress wire format
//!
//! Every frame starts with a 4-byte prefix that is either the compressed
//! envelope sentinel or a `command`/`channel` pair:
//!
//! ```text
//! Standard header (24 bytes, network order)
//! ┌─────────┬─────────┬──────────┬───────────┬──────────┐
//! │ command │ channel │ length   │ seconds   │ micros   │ payload...
//! │ u16     │ u16     │ u32      │ u64       │ u64      │
//! └─────────┴─────────┴──────────┴───────────┴──────────┘
//!
//! Compressed envelope (16 bytes, network order)
//! ┌──────────┬─────────────────┬───────────────┬──────────┐
//! │ "DAVE"   │ compressed_size │ expanded_size │ reserved │ zlib body...
//! │ u32      │ u32             │ u32           │ u32      │
//! └──────────┴─────────────────┴───────────────┴──────────┘
//! ```
//!
//! The expanded body of a compressed envelope is itself a complete frame
//! with a standard header.

use bytes::{Buf, BufMut, BytesMut};

use super::codec::{hton16, hton32, hton64, ntoh16, ntoh32, ntoh64};

/// Size of the classification prefix.
pub const SENTINEL_SIZE: usize = 4;
/// Size of the standard (uncompressed) header.
pub const STANDARD_DATA_HEADER_SIZE: usize = 24;
/// Size of the compressed envelope header.
pub const COMPRESSED_HEADER_SIZE: usize = 16;
/// Sentinel marking a compressed envelope ("DAVE").
pub const COMPRESSED_HEADER: u32 = 0x4441_5645;

/// 64-bit timestamped pixel data.
pub const WIFI_COMMAND_PIXELDATA64: u16 = 3;
/// Audio peak (frequency band) data.
pub const WIFI_COMMAND_PEAKDATA: u16 = 7;

/// Bytes per LED (one RGB triple).
pub const LED_DATA_SIZE: usize = 3;
/// Default number of audio bands a peak frame must carry.
pub const NUM_BANDS: u16 = 16;

/// Result of inspecting the first four bytes of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Compressed,
    Command { command: u16, channel: u16 },
}

/// Classify a frame from its 4-byte prefix.
///
/// The prefix is first tested as a single network-order u32 against the
/// sentinel; only when that fails is it split into two u16 fields.
pub fn classify(prefix: [u8; SENTINEL_SIZE]) -> FrameKind {
    let mut cur = &prefix[..];
    let sentinel = ntoh32(cur.get_u32_ne());
    if sentinel == COMPRESSED_HEADER {
        return FrameKind::Compressed;
    }

    let mut cur = &prefix[..];
    let command = ntoh16(cur.get_u16_ne());
    let channel = ntoh16(cur.get_u16_ne());
    FrameKind::Command { command, channel }
}

/// Fixed 24-byte header of a raw command frame.
///
/// For peak frames `channel` carries the band count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardHeader {
    pub command: u16,
    pub channel: u16,
    pub length: u32,
    pub seconds: u64,
    pub micros: u64,
}

impl StandardHeader {
    /// Parse from the first 24 bytes of `buf`. Returns `None` if `buf` is short.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < STANDARD_DATA_HEADER_SIZE {
            return None;
        }
        let mut cur = &buf[..STANDARD_DATA_HEADER_SIZE];
        Some(Self {
            command: ntoh16(cur.get_u16_ne()),
            channel: ntoh16(cur.get_u16_ne()),
            length: ntoh32(cur.get_u32_ne()),
            seconds: ntoh64(cur.get_u64_ne()),
            micros: ntoh64(cur.get_u64_ne()),
        })
    }

    pub fn encode<B: BufMut>(&self, out: &mut B) {
        out.put_u16_ne(hton16(self.command));
        out.put_u16_ne(hton16(self.channel));
        out.put_u32_ne(hton32(self.length));
        out.put_u64_ne(hton64(self.seconds));
        out.put_u64_ne(hton64(self.micros));
    }

    /// Sender timestamp in fractional seconds.
    pub fn timestamp(&self) -> f64 {
        self.seconds as f64 + self.micros as f64 / 1_000_000.0
    }
}

/// 16-byte envelope that precedes a zlib-compressed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedEnvelope {
    pub compressed_size: u32,
    pub expanded_size: u32,
    pub reserved: u32,
}

impl CompressedEnvelope {
    /// Parse the full envelope including the sentinel.
    ///
    /// Returns `None` if `buf` is short or does not start with the sentinel.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < COMPRESSED_HEADER_SIZE {
            return None;
        }
        let mut cur = &buf[..COMPRESSED_HEADER_SIZE];
        if ntoh32(cur.get_u32_ne()) != COMPRESSED_HEADER {
            return None;
        }
        Some(Self {
            compressed_size: ntoh32(cur.get_u32_ne()),
            expanded_size: ntoh32(cur.get_u32_ne()),
            reserved: ntoh32(cur.get_u32_ne()),
        })
    }

    pub fn encode<B: BufMut>(&self, out: &mut B) {
        out.put_u32_ne(hton32(COMPRESSED_HEADER));
        out.put_u32_ne(hton32(self.compressed_size));
        out.put_u32_ne(hton32(self.expanded_size));
        out.put_u32_ne(hton32(self.reserved));
    }
}

/// Total frame size of a pixel frame announcing `led_count` LEDs.
///
/// Computed in u64 so a hostile `led_count` cannot wrap.
pub fn pixel_frame_size(led_count: u32) -> u64 {
    STANDARD_DATA_HEADER_SIZE as u64 + led_count as u64 * LED_DATA_SIZE as u64
}

/// Build a pixel frame. `colors` holds packed RGB triples; a trailing
/// partial triple is dropped.
pub fn encode_pixel_frame(channel: u16, seconds: u64, micros: u64, colors: &[u8]) -> BytesMut {
    let led_count = colors.len() / LED_DATA_SIZE;
    let payload = &colors[..led_count * LED_DATA_SIZE];
    let header = StandardHeader {
        command: WIFI_COMMAND_PIXELDATA64,
        channel,
        length: led_count as u32,
        seconds,
        micros,
    };
    let mut out = BytesMut::with_capacity(STANDARD_DATA_HEADER_SIZE + payload.len());
    header.encode(&mut out);
    out.put_slice(payload);
    out
}

/// Build a peak frame. Band values are sent in the device's native
/// (little-endian) float layout, not network order.
pub fn encode_peak_frame(seconds: u64, micros: u64, bands: &[f32]) -> BytesMut {
    let header = StandardHeader {
        command: WIFI_COMMAND_PEAKDATA,
        channel: bands.len() as u16,
        length: (bands.len() * std::mem::size_of::<f32>()) as u32,
        seconds,
        micros,
    };
    let mut out = BytesMut::with_capacity(STANDARD_DATA_HEADER_SIZE + header.length as usize);
    header.encode(&mut out);
    for band in bands {
        out.put_f32_le(*band);
    }
    out
}

/// Read peak band values out of a peak frame payload.
pub fn decode_peak_bands(payload: &[u8]) -> Vec<f32> {
    let mut cur = payload;
    let mut bands = Vec::with_capacity(payload.len() / 4);
    while cur.remaining() >= 4 {
        bands.push(cur.get_f32_le());
    }
    bands
}
