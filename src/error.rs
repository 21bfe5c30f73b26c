//! Error kinds surfaced by the core, per the error handling design: invalid
//! ranges, out-of-bounds `select`, unsupported iterator mutation, and
//! corruption detected while deserializing a container from the wire.

use core::fmt;

/// An error produced by a fallible operation on a [`crate::Container`] or one
/// of its backing stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoaringCoreError {
    /// `iadd`/`iremove` was called with `begin >= end` or `end > 2^16`.
    InvalidRange {
        /// Inclusive-exclusive range start.
        begin: u32,
        /// Inclusive-exclusive range end.
        end: u32,
    },
    /// `select(j)` was called with `j >= cardinality`.
    IndexOutOfBounds {
        /// The requested rank.
        index: u64,
        /// The container's cardinality at the time of the call.
        cardinality: u64,
    },
    /// An iterator was asked to mutate the container it was created from.
    IteratorMutationUnsupported,
    /// A serialized container failed a structural invariant check: a run
    /// with `value + length > 0xFFFF`, runs not strictly sorted, or runs
    /// that should have been fused.
    CorruptContainer(&'static str),
}

impl fmt::Display for RoaringCoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoaringCoreError::InvalidRange { begin, end } => {
                write!(f, "invalid range: begin={begin} end={end}")
            }
            RoaringCoreError::IndexOutOfBounds { index, cardinality } => {
                write!(f, "index out of bounds: index={index} cardinality={cardinality}")
            }
            RoaringCoreError::IteratorMutationUnsupported => {
                write!(f, "mutation through an iterator is not implemented")
            }
            RoaringCoreError::CorruptContainer(reason) => {
                write!(f, "corrupt container: {reason}")
            }
        }
    }
}

impl std::error::Error for RoaringCoreError {}

pub type Result<T> = core::result::Result<T, RoaringCoreError>;

/// Shared precondition for every `iadd`/`iremove`/`not` range argument:
/// `begin < end <= 65536`.
pub(crate) fn validate_range(begin: u32, end: u32) -> Result<()> {
    if begin >= end || end > 0x1_0000 {
        return Err(RoaringCoreError::InvalidRange { begin, end });
    }
    Ok(())
}
