use super::{FragmentId, RejectReason};
use crate::packet::MessageType;

/// Header describing a single fragment.
///
/// The header carries everything a receiver needs to file a chunk: which set
/// it belongs to, where it sits, how many chunks the sender produced and the
/// message kind of the packet that was split.
///
/// # Examples
///
/// ```
/// use meshfrag::{
///     fragment::{FragmentHeader, FragmentId},
///     packet::MessageType,
/// };
/// let header = FragmentHeader::new(FragmentId::new([7; 8]), 0, 5, MessageType::MESSAGE);
/// assert_eq!(header.index(), 0);
/// assert_eq!(header.total(), 5);
/// assert!(header.validate().is_ok());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FragmentHeader {
    fragment_id: FragmentId,
    index: u16,
    total: u16,
    original_type: MessageType,
}

impl FragmentHeader {
    /// Create a new fragment header.
    #[must_use]
    pub const fn new(
        fragment_id: FragmentId,
        index: u16,
        total: u16,
        original_type: MessageType,
    ) -> Self {
        Self {
            fragment_id,
            index,
            total,
            original_type,
        }
    }

    /// Identifier of the set this fragment belongs to.
    #[must_use]
    pub const fn fragment_id(&self) -> FragmentId { self.fragment_id }

    /// Zero-based position within the set.
    #[must_use]
    pub const fn index(&self) -> u16 { self.index }

    /// Declared number of fragments in the set.
    #[must_use]
    pub const fn total(&self) -> u16 { self.total }

    /// Message kind of the packet before it was split.
    #[must_use]
    pub const fn original_type(&self) -> MessageType { self.original_type }

    /// Whether this is the highest index of its set.
    #[must_use]
    pub const fn is_last(&self) -> bool { self.index.saturating_add(1) == self.total }

    /// Check `total >= 1` and `index < total`.
    ///
    /// # Errors
    ///
    /// Returns [`RejectReason::ZeroTotal`] or [`RejectReason::IndexOutOfRange`].
    pub fn validate(&self) -> Result<(), RejectReason> {
        if self.total == 0 {
            return Err(RejectReason::ZeroTotal);
        }
        if self.index >= self.total {
            return Err(RejectReason::IndexOutOfRange {
                index: self.index,
                total: self.total,
            });
        }
        Ok(())
    }
}
