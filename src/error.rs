//! Error types for transport stream muxing.

use thiserror::Error;

/// Errors produced while building or inspecting a transport stream.
#[derive(Error, Debug)]
pub enum MuxError {
    /// No elementary stream is registered on the given PID.
    #[error("PID 0x{0:04X} not found")]
    PidNotFound(u16),

    /// An elementary stream is already registered on the given PID.
    #[error("PID 0x{0:04X} already exists")]
    PidAlreadyExists(u16),

    /// The PMT's PCR PID does not match any registered elementary stream.
    #[error("PCR PID 0x{0:04X} is not carried by any elementary stream")]
    PcrPidInvalid(u16),

    /// A PSI section does not fit into a single transport packet.
    #[error("PSI section of {0} bytes does not fit in one transport packet")]
    SectionTooLarge(usize),

    /// Packet content exceeds the fixed 188-byte packet size.
    #[error("packet content of {0} bytes exceeds the 188-byte transport packet")]
    PacketOverflow(usize),

    /// Unknown stream type value in a PMT.
    #[error("unsupported stream type: 0x{0:02X}")]
    UnsupportedStreamType(u8),

    /// Invalid sync byte (expected 0x47).
    #[error("invalid sync byte: expected 0x47, got 0x{0:02X}")]
    InvalidSyncByte(u8),

    /// Packet or header data shorter than required.
    #[error("data too short: expected {expected} bytes, got {actual}")]
    DataTooShort {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Invalid adaptation field.
    #[error("invalid adaptation field: {0}")]
    InvalidAdaptationField(String),

    /// Invalid PSI section.
    #[error("invalid PSI section: {0}")]
    InvalidPsi(String),

    /// Invalid PES data.
    #[error("invalid PES data: {0}")]
    InvalidPes(String),

    /// CRC mismatch while parsing a PSI section.
    #[error("CRC mismatch: expected 0x{expected:08X}, got 0x{actual:08X}")]
    CrcMismatch {
        /// CRC stored in the section.
        expected: u32,
        /// CRC computed over the section.
        actual: u32,
    },

    /// I/O error from the output sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MuxError {
    /// Create an invalid PSI error.
    pub fn invalid_psi(msg: impl Into<String>) -> Self {
        MuxError::InvalidPsi(msg.into())
    }

    /// Create an invalid PES error.
    pub fn invalid_pes(msg: impl Into<String>) -> Self {
        MuxError::InvalidPes(msg.into())
    }
}

/// Result type for muxing operations.
pub type Result<T> = std::result::Result<T, MuxError>;
