//! Status response sent back after every processed pixel frame.

use bytes::{Buf, BufMut, BytesMut};

use super::codec::{hton32, hton64, htond, ntoh32, ntoh64, ntohd};
use crate::buffer::Telemetry;

/// Encoded size of [`StatusResponse`] (packed, no padding).
pub const STATUS_RESPONSE_SIZE: usize = 72;

/// Telemetry snapshot returned to the sender. Fields are host order here;
/// [`StatusResponse::encode`] converts them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusResponse {
    pub size: u32,
    pub sequence: u64,
    pub flash_version: u32,
    pub current_clock: f64,
    pub oldest_packet: f64,
    pub newest_packet: f64,
    pub brightness: f64,
    pub wifi_signal: f64,
    pub buffer_size: u32,
    pub buffer_pos: u32,
    pub fps_drawing: u32,
    pub watts: u32,
}

impl StatusResponse {
    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(STATUS_RESPONSE_SIZE);
        out.put_u32_ne(hton32(self.size));
        out.put_u64_ne(hton64(self.sequence));
        out.put_u32_ne(hton32(self.flash_version));
        out.put_f64_ne(htond(self.current_clock));
        out.put_f64_ne(htond(self.oldest_packet));
        out.put_f64_ne(htond(self.newest_packet));
        out.put_f64_ne(htond(self.brightness));
        out.put_f64_ne(htond(self.wifi_signal));
        out.put_u32_ne(hton32(self.buffer_size));
        out.put_u32_ne(hton32(self.buffer_pos));
        out.put_u32_ne(hton32(self.fps_drawing));
        out.put_u32_ne(hton32(self.watts));
        out
    }

    /// Decode a response as received by a sender. Returns `None` if `buf`
    /// is shorter than [`STATUS_RESPONSE_SIZE`].
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < STATUS_RESPONSE_SIZE {
            return None;
        }
        let mut cur = &buf[..STATUS_RESPONSE_SIZE];
        Some(Self {
            size: ntoh32(cur.get_u32_ne()),
            sequence: ntoh64(cur.get_u64_ne()),
            flash_version: ntoh32(cur.get_u32_ne()),
            current_clock: ntohd(cur.get_f64_ne()),
            oldest_packet: ntohd(cur.get_f64_ne()),
            newest_packet: ntohd(cur.get_f64_ne()),
            brightness: ntohd(cur.get_f64_ne()),
            wifi_signal: ntohd(cur.get_f64_ne()),
            buffer_size: ntoh32(cur.get_u32_ne()),
            buffer_pos: ntoh32(cur.get_u32_ne()),
            fps_drawing: ntoh32(cur.get_u32_ne()),
            watts: ntoh32(cur.get_u32_ne()),
        })
    }
}

/// Builds status responses and owns the response sequence counter.
///
/// One builder lives for the whole server, so the sequence keeps counting
/// across connections.
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    sequence: u64,
    flash_version: u32,
}

impl ResponseBuilder {
    pub fn new(flash_version: u32) -> Self {
        Self { sequence: 0, flash_version }
    }

    /// Sequence number the next response will carry.
    pub fn next_sequence(&self) -> u64 {
        self.sequence
    }

    /// Snapshot `telemetry` into a response and advance the sequence.
    pub fn build(&mut self, telemetry: &dyn Telemetry) -> StatusResponse {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        StatusResponse {
            size: STATUS_RESPONSE_SIZE as u32,
            sequence,
            flash_version: self.flash_version,
            current_clock: telemetry.current_time(),
            oldest_packet: telemetry.oldest_buffer_age(),
            newest_packet: telemetry.newest_buffer_age(),
            brightness: telemetry.brightness(),
            wifi_signal: telemetry.signal_strength(),
            buffer_size: telemetry.buffer_count(),
            buffer_pos: telemetry.buffer_depth(),
            fps_drawing: telemetry.fps(),
            watts: telemetry.watts(),
        }
    }
}
