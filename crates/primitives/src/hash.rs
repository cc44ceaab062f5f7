/// 256-bit share identifier.
///
/// The all-zero hash is used as the predecessor of shares that start a chain,
/// it never names a real share.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ShareHash([u8; 32]);

impl_hash_buf!(ShareHash, 32);
