use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidAddressReason {
    #[error("address is empty")]
    Empty,
    #[error("expected 1 to 4 '_'-separated segments")]
    SegmentCount,
    #[error("unexpected segment prefix")]
    SegmentPrefix,
    #[error("index is not numeric")]
    NonNumericIndex,
    #[error("index must be >= 0 or '*'")]
    IndexOutOfRange,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address '{value}': {reason}.")]
    InvalidAddress {
        value: String,
        reason: InvalidAddressReason,
    },
    #[error("Address {address} has no child level.")]
    NoChildLevel { address: String },
    #[error("Invalid child index {index} (must be >= 1 or the wildcard).")]
    InvalidChildIndex { index: i32 },
}

impl AddressError {
    pub(crate) fn invalid(value: &str, reason: InvalidAddressReason) -> Self {
        Self::InvalidAddress {
            value: value.to_owned(),
            reason,
        }
    }
}
