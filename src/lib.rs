//! # mpegts-mux
//!
//! Single-program MPEG Transport Stream (ISO/IEC 13818-1) multiplexer.
//!
//! This crate packetizes elementary-stream payloads (video, audio, data)
//! into fixed 188-byte transport packets, maintaining per-PID continuity
//! counters, generating PAT/PMT tables with wrapping version numbers, and
//! retransmitting those tables periodically and at random-access points so
//! a demuxer can synchronize anywhere in the stream.
//!
//! ## Features
//!
//! - **188-byte packets**: every byte written to the sink belongs to a
//!   whole, aligned transport packet
//! - **PES packetization**: one PES unit is spread across as many packets
//!   as needed, with adaptation-field stuffing ahead of the payload
//! - **PAT/PMT generation**: sections are serialized with MPEG CRC-32 and
//!   cached until a registration change invalidates them
//! - **Table cadence**: tables are emitted on the first write, every
//!   configurable number of writes, and before random-access points on the
//!   PCR stream
//! - **Stream types**: video (MPEG-1/2/4, H.264, H.265, CAVS, VC-1, DIRAC),
//!   audio (MPEG-1/2, AAC, AAC-LATM, AC-3, E-AC-3), private data, metadata
//!
//! ## Example
//!
//! ```
//! use mpegts_mux::{
//!     AdaptationField, ElementaryStream, Muxer, MuxerConfig, PesHeader, PesTimestamp,
//!     StreamType,
//! };
//!
//! # fn main() -> mpegts_mux::Result<()> {
//! let mut muxer = Muxer::new(Vec::new(), MuxerConfig::default());
//!
//! // Register an H.264 stream on an auto-assigned PID, carrying the PCR.
//! let pid = muxer.add_elementary_stream(ElementaryStream::new(0, StreamType::H264), true)?;
//!
//! // Mux one access unit at a random-access point.
//! let af = AdaptationField {
//!     random_access: true,
//!     ..AdaptationField::default()
//! };
//! let header = PesHeader::with_pts(PesTimestamp::new(90_000));
//! let access_unit = vec![0u8; 1024];
//! muxer.write_payload(pid, Some(&af), &header, &access_unit)?;
//!
//! let stream = muxer.into_inner();
//! assert_eq!(stream.len() % 188, 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Transport packet structure
//!
//! ```text
//! +------+----------------+------------+----------------------+
//! | Sync | TEI PUSI TP    | Adaptation | Payload              |
//! | 0x47 | PID  SC AFC CC | field      | (PSI or PES bytes)   |
//! +------+----------------+------------+----------------------+
//!    1        3 bytes        0-184          0-184 bytes
//! ```
//!
//! ## Reserved PIDs
//!
//! | PID    | Use                                   |
//! |--------|---------------------------------------|
//! | 0x0000 | PAT                                   |
//! | 0x1000 | the single program's PMT              |
//! | 0x0100 | first auto-assigned elementary stream |
//! | 0x1FFF | null packets                          |
//!
//! Out of scope: multi-program streams, 192-byte M2TS packets, PSI sections
//! spanning packets, PCR clock generation and rate control, scrambling, and
//! demuxing.

pub mod counter;
pub mod error;
pub mod muxer;
pub mod packet;
pub mod pes;
pub mod psi;

// Re-export main types
pub use counter::{WrappingCounter, CONTINUITY_COUNTER_MASK, VERSION_MASK};
pub use error::{MuxError, Result};
pub use muxer::{Muxer, MuxerConfig, PID_FIRST_ELEMENTARY, PID_PMT, PROGRAM_NUMBER};
pub use packet::{
    write_packet, AdaptationField, AdaptationFieldControl, Pcr, ScramblingControl, TsHeader,
    PID_MAX, PID_NULL, PID_PAT, SYNC_BYTE, TS_PACKET_SIZE,
};
pub use pes::{
    write_pes_data, PesHeader, PesOptionalHeader, PesTimestamp, StreamId, PES_HEADER_SIZE,
    PES_START_CODE_PREFIX,
};
pub use psi::{calculate_crc32, ElementaryStream, Pat, PatEntry, Pmt, StreamType};
