//! Host/network byte-order conversion
//!
//! The 16 and 32-bit conversions map straight onto the integer primitives.
//! There is no 64-bit network primitive on the wire side, so 64-bit values
//! are converted as two independent 32-bit halves whose positions are then
//! swapped. Doubles travel as their raw bit pattern pushed through the
//! 64-bit conversion, which keeps NaN payloads and infinities intact.
//!
//! Every `hton*` result is a value whose *native* byte layout is big-endian,
//! so it is written with `to_ne_bytes` / `put_*_ne`. The `ntoh*` functions
//! take a value read with `from_ne_bytes` / `get_*_ne`.

/// Host to network order, 16-bit.
#[inline]
pub fn hton16(host: u16) -> u16 {
    host.to_be()
}

/// Network to host order, 16-bit.
#[inline]
pub fn ntoh16(net: u16) -> u16 {
    u16::from_be(net)
}

/// Host to network order, 32-bit.
#[inline]
pub fn hton32(host: u32) -> u32 {
    host.to_be()
}

/// Network to host order, 32-bit.
#[inline]
pub fn ntoh32(net: u32) -> u32 {
    u32::from_be(net)
}

/// Host to network order, 64-bit, built from two 32-bit conversions.
#[inline]
pub fn hton64(host: u64) -> u64 {
    if cfg!(target_endian = "big") {
        return host;
    }
    let low = hton32(host as u32) as u64;
    let high = hton32((host >> 32) as u32) as u64;
    (low << 32) | high
}

/// Network to host order, 64-bit, built from two 32-bit conversions.
#[inline]
pub fn ntoh64(net: u64) -> u64 {
    if cfg!(target_endian = "big") {
        return net;
    }
    let low = ntoh32(net as u32) as u64;
    let high = ntoh32((net >> 32) as u32) as u64;
    (low << 32) | high
}

/// Host to network order for an IEEE-754 double.
///
/// The returned `f64` is only meaningful as a bit carrier; it may well be a
/// NaN on the host side.
#[inline]
pub fn htond(host: f64) -> f64 {
    f64::from_bits(hton64(host.to_bits()))
}

/// Network to host order for an IEEE-754 double.
#[inline]
pub fn ntohd(net: f64) -> f64 {
    f64::from_bits(ntoh64(net.to_bits()))
}
