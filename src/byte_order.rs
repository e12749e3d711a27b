//! Network byte-order helpers for the fixed-width wire fields.
//!
//! Both the packet envelope and the fragment sub-format store multi-byte
//! integers big-endian. Keeping the conversions here scopes the Clippy
//! expectation to one place and gives the codecs bounds-checked readers that
//! never panic on truncated input.

/// Serialise a `u16` in network byte order.
///
/// # Examples
///
/// ```
/// use meshfrag::byte_order::write_network_u16;
///
/// assert_eq!(write_network_u16(0x01f4), [0x01, 0xf4]);
/// ```
#[must_use]
pub fn write_network_u16(value: u16) -> [u8; 2] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    value.to_be_bytes()
}

/// Serialise a `u64` in network byte order.
///
/// # Examples
///
/// ```
/// use meshfrag::byte_order::write_network_u64;
///
/// assert_eq!(write_network_u64(1), [0, 0, 0, 0, 0, 0, 0, 1]);
/// ```
#[must_use]
pub fn write_network_u64(value: u64) -> [u8; 8] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    value.to_be_bytes()
}

/// Read a network-order `u16` starting at `offset`.
///
/// Returns `None` when fewer than two bytes remain.
///
/// # Examples
///
/// ```
/// use meshfrag::byte_order::read_network_u16_at;
///
/// assert_eq!(read_network_u16_at(&[0xff, 0x00, 0x05], 1), Some(5));
/// assert_eq!(read_network_u16_at(&[0xff], 0), None);
/// ```
#[must_use]
pub fn read_network_u16_at(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw: [u8; 2] = bytes.get(offset..offset.checked_add(2)?)?.try_into().ok()?;
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    Some(u16::from_be_bytes(raw))
}

/// Read a network-order `u64` starting at `offset`.
///
/// Returns `None` when fewer than eight bytes remain.
#[must_use]
pub fn read_network_u64_at(bytes: &[u8], offset: usize) -> Option<u64> {
    let raw: [u8; 8] = bytes.get(offset..offset.checked_add(8)?)?.try_into().ok()?;
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    Some(u64::from_be_bytes(raw))
}
