//! Size-bucket padding applied to encoded packets.
//!
//! Encoded packets are rounded up to one of a few fixed sizes so an observer
//! on the radio link learns little from frame lengths. The trailer follows
//! PKCS#7: every padding byte holds the padding length. Inputs that already
//! sit on a bucket, or cannot reach one with at most 255 bytes of padding, are
//! left as they are. A trailer is therefore optional, and only a reader that
//! knows the frame length (the codec, from the envelope header) can tell
//! whether one is present.

use thiserror::Error;

/// Target sizes, smallest first.
pub const BLOCK_SIZES: [usize; 4] = [256, 512, 1024, 2048];

/// Errors raised when a padding trailer is inconsistent.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PaddingError {
    /// There are no bytes to inspect.
    #[error("cannot unpad an empty buffer")]
    Empty,
    /// The trailer declares zero padding or more bytes than are present.
    #[error("padding length {declared} invalid for {available}-byte buffer")]
    InvalidLength { declared: usize, available: usize },
    /// One of the trailer bytes disagrees with the declared length.
    #[error("padding trailer of {declared} bytes is inconsistent")]
    InconsistentTrailer { declared: usize },
}

/// Number of padding bytes [`pad`] appends to a buffer of `len` bytes.
///
/// # Examples
///
/// ```
/// use meshfrag::packet::padding::padding_len;
///
/// assert_eq!(padding_len(100), 156);
/// assert_eq!(padding_len(300), 212);
/// assert_eq!(padding_len(512), 0);
/// assert_eq!(padding_len(3000), 0);
/// ```
#[must_use]
pub fn padding_len(len: usize) -> u8 {
    BLOCK_SIZES
        .iter()
        .find_map(|&block| {
            block
                .checked_sub(len)
                .and_then(|needed| u8::try_from(needed).ok())
        })
        .unwrap_or(0)
}

/// Append a padding trailer to `bytes`, if it has a reachable bucket.
#[must_use]
pub fn pad(bytes: &[u8]) -> Vec<u8> {
    let count = padding_len(bytes.len());
    let mut padded = Vec::with_capacity(bytes.len() + usize::from(count));
    padded.extend_from_slice(bytes);
    padded.resize(bytes.len() + usize::from(count), count);
    padded
}

/// Strip a padding trailer known to be present at the end of `bytes`.
///
/// Buffers that [`pad`] left unchanged carry no trailer; their last byte is
/// content and must not be passed here.
///
/// # Errors
///
/// Returns [`PaddingError`] if the buffer is empty or the trailer is not a
/// well-formed run of its own length.
pub fn unpad(bytes: &[u8]) -> Result<&[u8], PaddingError> {
    let &last = bytes.last().ok_or(PaddingError::Empty)?;
    let declared = usize::from(last);
    if declared == 0 || declared > bytes.len() {
        return Err(PaddingError::InvalidLength {
            declared,
            available: bytes.len(),
        });
    }
    let (content, trailer) = bytes.split_at(bytes.len() - declared);
    if trailer.iter().any(|&byte| byte != last) {
        return Err(PaddingError::InconsistentTrailer { declared });
    }
    Ok(content)
}
