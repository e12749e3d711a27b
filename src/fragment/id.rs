use derive_more::{From, Into};

/// Width of a fragment-set identifier on the wire.
pub const FRAGMENT_ID_SIZE: usize = 8;

/// Random identifier shared by every fragment of one split packet.
///
/// Identifiers are drawn from 64 random bits, so collisions between sets that
/// are in flight within one reassembly timeout are negligible. The stable
/// string form is lowercase hex.
///
/// # Examples
///
/// ```
/// use meshfrag::fragment::FragmentId;
/// let id = FragmentId::new([0, 1, 2, 3, 4, 5, 6, 0xff]);
/// assert_eq!(id.to_string(), "00010203040506ff");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, From, Into)]
pub struct FragmentId([u8; FRAGMENT_ID_SIZE]);

impl FragmentId {
    /// Wrap raw identifier bytes.
    #[must_use]
    pub const fn new(bytes: [u8; FRAGMENT_ID_SIZE]) -> Self { Self(bytes) }

    /// Draw a fresh identifier from the thread-local RNG.
    #[must_use]
    pub fn random() -> Self { Self(rand::random()) }

    /// Borrow the identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; FRAGMENT_ID_SIZE] { &self.0 }
}

impl std::fmt::Display for FragmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
