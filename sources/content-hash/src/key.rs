/// The pseudo-stat key that serves as the HMAC key when hashing a filesystem entry.
///
/// Laid out as five little-endian `u64` fields in the order `(mode, uid, gid, rdev, size)`,
/// for a 40-byte key. `rdev` is always zero: device files are not a supported entry type and
/// the field exists purely to keep the key layout stable across implementations.
pub(crate) struct StatKey {
    pub mode: u64,
    pub uid: u64,
    pub gid: u64,
    pub size: u64,
}

impl StatKey {
    const RDEV: u64 = 0;

    pub(crate) fn to_bytes(&self) -> [u8; 40] {
        let mut buf = [0u8; 40];
        buf[0..8].copy_from_slice(&self.mode.to_le_bytes());
        buf[8..16].copy_from_slice(&self.uid.to_le_bytes());
        buf[16..24].copy_from_slice(&self.gid.to_le_bytes());
        buf[24..32].copy_from_slice(&Self::RDEV.to_le_bytes());
        buf[32..40].copy_from_slice(&self.size.to_le_bytes());
        buf
    }
}
