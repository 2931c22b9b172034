//! Container format sniffing.

/// HDF5 superblock signature.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// Smallest user-block size; the superblock may start at 0 or any power of
/// two from here on.
const FIRST_USERBLOCK_OFFSET: usize = 512;

/// Recognised container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// HDF5 container (NeXus/NXmx or vendor master file).
    Hdf5Nexus,
    /// Not recognised; the file must not be decoded.
    Unknown,
}

impl FormatKind {
    /// Display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            FormatKind::Hdf5Nexus => "HDF5/NeXus",
            FormatKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifies the leading bytes of a file.
///
/// Buffers shorter than one signature are always `Unknown`.
#[must_use]
pub fn classify(prefix: &[u8]) -> FormatKind {
    if has_signature_at(prefix, 0) {
        return FormatKind::Hdf5Nexus;
    }

    let mut offset = FIRST_USERBLOCK_OFFSET;
    while offset + HDF5_SIGNATURE.len() <= prefix.len() {
        if has_signature_at(prefix, offset) {
            tracing::debug!(offset, "HDF5 signature found after user block");
            return FormatKind::Hdf5Nexus;
        }
        offset *= 2;
    }

    FormatKind::Unknown
}

fn has_signature_at(prefix: &[u8], offset: usize) -> bool {
    prefix
        .get(offset..offset + HDF5_SIGNATURE.len())
        .is_some_and(|bytes| bytes == HDF5_SIGNATURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_hdf5_signature() {
        let mut buf = HDF5_SIGNATURE.to_vec();
        buf.extend_from_slice(&[0u8; 32]);
        assert_eq!(classify(&buf), FormatKind::Hdf5Nexus);
    }

    #[test]
    fn test_classify_after_userblock() {
        let mut buf = vec![0u8; 1024];
        buf.extend_from_slice(&HDF5_SIGNATURE);
        assert_eq!(classify(&buf), FormatKind::Hdf5Nexus);
    }

    #[test]
    fn test_classify_misaligned_signature_is_unknown() {
        let mut buf = vec![0u8; 100];
        buf.extend_from_slice(&HDF5_SIGNATURE);
        assert_eq!(classify(&buf), FormatKind::Unknown);
    }

    #[test]
    fn test_classify_short_or_foreign_input() {
        assert_eq!(classify(&[]), FormatKind::Unknown);
        assert_eq!(classify(&HDF5_SIGNATURE[..6]), FormatKind::Unknown);
        assert_eq!(classify(b"###CBF: VERSION 1.5"), FormatKind::Unknown);
    }
}
