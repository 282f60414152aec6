use thiserror::Error;

use crate::header::HeaderKind;

/// Error decoding or encoding a frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("frame is too short (present={present}, required={required})")]
    TooShort { required: usize, present: usize },
    #[error("unsupported {layer} type 0x{value:04x}")]
    UnsupportedType { layer: HeaderKind, value: u16 },
    #[error("label in domain name has unknown label format 0x{0:02x}")]
    UnknownLabelFormat(u8),
    #[error("compression pointer at {pointer} refers forward to {target}")]
    MalformedCompressionPointer { pointer: usize, target: usize },
    #[error("domain name is {0} bytes long, at most 253 are allowed")]
    NameTooLong(usize),
    #[error("record type {rtype} declares {declared} bytes of RDATA but {consumed} were used")]
    WrongRdataLength {
        rtype: u16,
        declared: u16,
        consumed: usize,
    },
    #[error("UDP header can't be encoded without an IPv4 header below it")]
    MissingPseudoHeader,
    #[error("{layer} checksum mismatch (stored=0x{stored:04x}, computed=0x{computed:04x})")]
    ChecksumMismatch {
        layer: HeaderKind,
        stored: u16,
        computed: u16,
    },
    #[error("header storage can't grow by {requested} slots")]
    OutOfMemory { requested: usize },
}

impl Error {
    /// Whether the frame itself is at fault, as opposed to the host running
    /// out of memory while decoding it.
    pub fn is_malformed(&self) -> bool {
        !matches!(*self, Error::OutOfMemory { .. })
    }
}
