//! Frame consumer and telemetry source
//!
//! The ingress session hands every validated frame to a [`FrameSink`] and
//! reads device state for status responses through [`Telemetry`].
//! [`BufferManager`] is the in-memory implementation used by the server
//! binary: a bounded ring of timestamped LED frames plus the latest audio
//! peaks.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use bytes::Bytes;

use crate::network::wire::{
    decode_peak_bands, StandardHeader, STANDARD_DATA_HEADER_SIZE, WIFI_COMMAND_PEAKDATA,
    WIFI_COMMAND_PIXELDATA64,
};

/// Accepts validated frames for rendering.
///
/// `frame` is a complete frame starting with its [`StandardHeader`].
pub trait FrameSink: Send {
    fn accept(&mut self, frame: &[u8]) -> Result<()>;
}

/// Live device state reported in status responses.
///
/// Values are snapshots of state mutated elsewhere; they only need to be
/// individually consistent, not mutually.
pub trait Telemetry: Send + Sync {
    /// Device clock in seconds since the Unix epoch.
    fn current_time(&self) -> f64;
    /// Timestamp of the oldest buffered frame minus the current time.
    fn oldest_buffer_age(&self) -> f64;
    /// Timestamp of the newest buffered frame minus the current time.
    fn newest_buffer_age(&self) -> f64;
    fn brightness(&self) -> f64;
    /// Signal strength in dBm. Wired hosts report 0.
    fn signal_strength(&self) -> f64;
    /// Capacity of the frame ring.
    fn buffer_count(&self) -> u32;
    /// Frames currently buffered.
    fn buffer_depth(&self) -> u32;
    fn fps(&self) -> u32;
    fn watts(&self) -> u32;
}

/// One buffered LED frame.
#[derive(Debug, Clone)]
pub struct LedFrame {
    pub channel: u16,
    /// Presentation time in seconds since the Unix epoch.
    pub timestamp: f64,
    /// Packed RGB triples.
    pub colors: Bytes,
}

/// Bounded ring of LED frames.
pub struct BufferManager {
    frames: VecDeque<LedFrame>,
    capacity: usize,
    peaks: Vec<f32>,
    brightness: u8,
    watts: u32,
    accepted: VecDeque<Instant>,
}

impl BufferManager {
    pub fn new(capacity: usize, brightness: u8) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            peaks: Vec::new(),
            brightness,
            watts: 0,
            accepted: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn oldest(&self) -> Option<&LedFrame> {
        self.frames.front()
    }

    pub fn newest(&self) -> Option<&LedFrame> {
        self.frames.back()
    }

    /// Remove and return the oldest frame.
    pub fn pop_oldest(&mut self) -> Option<LedFrame> {
        self.frames.pop_front()
    }

    /// Latest audio peak bands.
    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
    }

    pub fn set_watts(&mut self, watts: u32) {
        self.watts = watts;
    }

    /// Frames accepted during the last second.
    pub fn fps(&mut self) -> u32 {
        self.prune_rate_window(Instant::now());
        self.accepted.len() as u32
    }

    fn prune_rate_window(&mut self, now: Instant) {
        while let Some(first) = self.accepted.front() {
            if now.duration_since(*first) > Duration::from_secs(1) {
                self.accepted.pop_front();
            } else {
                break;
            }
        }
    }

    fn push_frame(&mut self, frame: LedFrame) {
        if self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);

        let now = Instant::now();
        self.accepted.push_back(now);
        self.prune_rate_window(now);
    }

    fn age_of(&self, frame: Option<&LedFrame>, now: f64) -> f64 {
        frame.map(|f| f.timestamp - now).unwrap_or(0.0)
    }
}

impl FrameSink for BufferManager {
    fn accept(&mut self, frame: &[u8]) -> Result<()> {
        let Some(header) = StandardHeader::parse(frame) else {
            bail!("frame of {} bytes has no standard header", frame.len());
        };
        let payload = &frame[STANDARD_DATA_HEADER_SIZE..];

        match header.command {
            WIFI_COMMAND_PIXELDATA64 => {
                if self.capacity == 0 {
                    bail!("buffer ring has no capacity");
                }
                self.push_frame(LedFrame {
                    channel: header.channel,
                    timestamp: header.timestamp(),
                    colors: Bytes::copy_from_slice(payload),
                });
                tracing::trace!(
                    "[buffer] [push] channel={} leds={} depth={}",
                    header.channel,
                    header.length,
                    self.frames.len()
                );
            }
            WIFI_COMMAND_PEAKDATA => {
                self.peaks = decode_peak_bands(payload);
            }
            other => bail!("unsupported command {} in frame", other),
        }
        Ok(())
    }
}

/// Clock used for status responses.
pub fn unix_time_now() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0
}

/// [`BufferManager`] shared between the ingress server and a renderer.
#[derive(Clone)]
pub struct SharedBuffers(pub Arc<Mutex<BufferManager>>);

impl SharedBuffers {
    pub fn new(manager: BufferManager) -> Self {
        Self(Arc::new(Mutex::new(manager)))
    }

    fn with<T>(&self, f: impl FnOnce(&mut BufferManager) -> T) -> T {
        // poisoning ignored: the ring is plain data
        let mut guard = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl FrameSink for SharedBuffers {
    fn accept(&mut self, frame: &[u8]) -> Result<()> {
        self.with(|m| m.accept(frame))
    }
}

impl Telemetry for SharedBuffers {
    fn current_time(&self) -> f64 {
        unix_time_now()
    }

    fn oldest_buffer_age(&self) -> f64 {
        let now = unix_time_now();
        self.with(|m| m.age_of(m.oldest(), now))
    }

    fn newest_buffer_age(&self) -> f64 {
        let now = unix_time_now();
        self.with(|m| m.age_of(m.newest(), now))
    }

    fn brightness(&self) -> f64 {
        self.with(|m| m.brightness as f64)
    }

    fn signal_strength(&self) -> f64 {
        0.0
    }

    fn buffer_count(&self) -> u32 {
        self.with(|m| m.capacity as u32)
    }

    fn buffer_depth(&self) -> u32 {
        self.with(|m| m.frames.len() as u32)
    }

    fn fps(&self) -> u32 {
        self.with(|m| m.fps())
    }

    fn watts(&self) -> u32 {
        self.with(|m| m.watts)
    }
}
