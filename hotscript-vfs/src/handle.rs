//! Open file handles and modification timestamps

use crate::error::VfsResult;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Modification timestamp of a file.
///
/// Milliseconds since the Unix epoch for native files, a logical clock value
/// for in-memory files. Only the ordering matters to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The earliest possible timestamp
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Convert a system time; times before the epoch clamp to zero
    pub fn from_system_time(time: SystemTime) -> Self {
        let millis = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().min(u64::MAX as u128) as u64)
            .unwrap_or(0);
        Self(millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A file opened through a [`VirtualFileSystem`](crate::VirtualFileSystem).
///
/// Handles must be released with [`FileHandle::close`]. Implementations may
/// hold OS resources (descriptors, connections) until then.
pub trait FileHandle: Send {
    /// Modification timestamp of the opened file
    fn modified(&self) -> VfsResult<Timestamp>;

    /// Read the whole remaining content
    fn read_to_end(&mut self) -> VfsResult<Vec<u8>>;

    /// Release the handle
    fn close(self: Box<Self>) -> VfsResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timestamp_ordering() {
        assert!(Timestamp::from_millis(1) < Timestamp::from_millis(2));
        assert_eq!(Timestamp::default(), Timestamp::ZERO);
    }

    #[test]
    fn test_from_system_time() {
        let t = UNIX_EPOCH + Duration::from_millis(1500);
        assert_eq!(Timestamp::from_system_time(t).as_millis(), 1500);
        assert_eq!(Timestamp::from_system_time(UNIX_EPOCH), Timestamp::ZERO);
    }
}
