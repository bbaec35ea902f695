//! ledsock - LED strip network ingress
//!
//! Receives pixel and audio frames from a remote sender over TCP, validates
//! and expands them, hands them to a frame buffer and answers pixel frames
//! with a fixed-layout status packet.

/// Ingress configuration
pub mod config;
/// Byte-order codec and wire formats
pub mod network;
/// Frame reader and session errors
pub mod session;
/// Decompressor trait and zlib implementation
pub mod compress;
/// Frame consumer, telemetry and the in-memory LED frame ring
pub mod buffer;
/// Server implementations
pub mod servers;
