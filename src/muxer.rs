//! Single-program transport stream muxer.
//!
//! The muxer accepts elementary-stream payloads together with their PES
//! metadata and emits fixed 188-byte transport packets to a byte sink,
//! interleaving PAT/PMT tables on a configurable cadence and at
//! random-access points so a demuxer can tune in mid-stream.

use crate::counter::{WrappingCounter, CONTINUITY_COUNTER_MASK, VERSION_MASK};
use crate::error::{MuxError, Result};
use crate::packet::{
    write_packet, AdaptationField, AdaptationFieldControl, TsHeader, PID_PAT, TS_PACKET_SIZE,
};
use crate::pes::{write_pes_data, PesHeader};
use crate::psi::{ElementaryStream, Pat, Pmt, StreamType};

use std::collections::{BTreeMap, HashMap};
use std::io::Write;

/// PID carrying the single program's PMT.
pub const PID_PMT: u16 = 0x1000;

/// First PID handed out by the automatic PID allocator.
pub const PID_FIRST_ELEMENTARY: u16 = 0x0100;

/// Program number of the single program.
pub const PROGRAM_NUMBER: u16 = 1;

/// Default number of payload writes between forced table emissions.
const DEFAULT_TABLES_RETRANSMIT_PERIOD: usize = 40;

/// Muxer configuration.
#[derive(Debug, Clone)]
pub struct MuxerConfig {
    /// Transport stream id written into the PAT.
    pub transport_stream_id: u16,
    /// Number of [`Muxer::write_payload`] calls between table emissions.
    pub tables_retransmit_period: usize,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            transport_stream_id: 1,
            tables_retransmit_period: DEFAULT_TABLES_RETRANSMIT_PERIOD,
        }
    }
}

/// Mapping from PMT-carrying PID to program number.
#[derive(Debug, Default)]
struct ProgramMap {
    entries: BTreeMap<u16, u16>,
}

impl ProgramMap {
    fn set(&mut self, pmt_pid: u16, program_number: u16) {
        self.entries.insert(pmt_pid, program_number);
    }

    /// Project the map into a PAT section body.
    fn to_pat(&self, transport_stream_id: u16, version_number: u8) -> Pat {
        let mut pat = Pat::new(transport_stream_id);
        pat.version_number = version_number;
        for (&pmt_pid, &program_number) in &self.entries {
            pat.add_program(program_number, pmt_pid);
        }
        pat
    }
}

/// Per-PID runtime state for a registered elementary stream.
#[derive(Debug)]
struct EsContext {
    stream_type: StreamType,
    cc: WrappingCounter,
}

impl EsContext {
    fn new(stream_type: StreamType) -> Self {
        Self {
            stream_type,
            cc: WrappingCounter::new(CONTINUITY_COUNTER_MASK),
        }
    }
}

/// Single-program MPEG-TS muxer over a byte sink.
///
/// Not thread-safe; callers that share a muxer serialize externally.
pub struct Muxer<W: Write> {
    writer: W,
    config: MuxerConfig,
    packet_size: usize,

    program_map: ProgramMap,
    pmt: Pmt,
    next_pid: u16,
    pat_version: WrappingCounter,
    pmt_version: WrappingCounter,
    pat_cc: WrappingCounter,
    pmt_cc: WrappingCounter,

    // serialized table packets, valid for reuse only at exactly packet_size
    pat_packet: Vec<u8>,
    pmt_packet: Vec<u8>,

    scratch: Vec<u8>,
    es: HashMap<u16, EsContext>,
    tables_retransmit_counter: usize,
    packets_written: u64,
}

impl<W: Write> Muxer<W> {
    /// Create a muxer writing to `writer`.
    pub fn new(writer: W, config: MuxerConfig) -> Self {
        let mut program_map = ProgramMap::default();
        program_map.set(PID_PMT, PROGRAM_NUMBER);

        // start at the period so the first payload write emits tables
        let tables_retransmit_counter = config.tables_retransmit_period;

        Self {
            writer,
            config,
            packet_size: TS_PACKET_SIZE,
            program_map,
            pmt: Pmt::new(PROGRAM_NUMBER, 0),
            next_pid: PID_FIRST_ELEMENTARY,
            pat_version: WrappingCounter::new(VERSION_MASK),
            pmt_version: WrappingCounter::new(VERSION_MASK),
            pat_cc: WrappingCounter::new(CONTINUITY_COUNTER_MASK),
            pmt_cc: WrappingCounter::new(CONTINUITY_COUNTER_MASK),
            pat_packet: Vec::new(),
            pmt_packet: Vec::new(),
            scratch: Vec::with_capacity(TS_PACKET_SIZE),
            es: HashMap::new(),
            tables_retransmit_counter,
            packets_written: 0,
        }
    }

    /// Register an elementary stream, returning the PID it is carried on.
    ///
    /// A zero `pid` requests a PID from the automatic allocator. When `pcr`
    /// is set, the stream becomes the program's PCR carrier.
    pub fn add_elementary_stream(&mut self, mut es: ElementaryStream, pcr: bool) -> Result<u16> {
        if es.pid == 0 {
            es.pid = self.next_pid;
            self.next_pid += 1;
        } else if self.es.contains_key(&es.pid) {
            return Err(MuxError::PidAlreadyExists(es.pid));
        }

        let pid = es.pid;
        if pcr {
            self.pmt.pcr_pid = pid;
        }

        self.es.insert(pid, EsContext::new(es.stream_type));
        tracing::debug!(pid, stream_type = ?es.stream_type, pcr, "registered elementary stream");
        self.pmt.streams.push(es);
        self.pmt_packet.clear(); // invalidate the cached PMT packet

        Ok(pid)
    }

    /// Remove a registered elementary stream.
    pub fn remove_elementary_stream(&mut self, pid: u16) -> Result<()> {
        let index = self
            .pmt
            .streams
            .iter()
            .position(|es| es.pid == pid)
            .ok_or(MuxError::PidNotFound(pid))?;

        self.pmt.streams.remove(index);
        self.es.remove(&pid);
        self.pmt_packet.clear();
        tracing::debug!(pid, "removed elementary stream");

        Ok(())
    }

    /// Designate the PID that carries the PCR.
    ///
    /// Validation happens at the next table generation: a PID that matches
    /// no registered stream fails with [`MuxError::PcrPidInvalid`].
    pub fn set_pcr_pid(&mut self, pid: u16) {
        self.pmt.pcr_pid = pid;
        self.pmt_packet.clear();
    }

    /// Write one PES unit for the elementary stream on `pid`.
    ///
    /// The caller's adaptation field, when given, is attached to the unit's
    /// first packet. Scheduled (or random-access-forced) PAT/PMT packets
    /// precede the payload packets. Returns the number of bytes delivered to
    /// the sink, tables included. An empty payload writes no packets beyond
    /// any scheduled tables.
    pub fn write_payload(
        &mut self,
        pid: u16,
        adaptation_field: Option<&AdaptationField>,
        header: &PesHeader,
        payload: &[u8],
    ) -> Result<usize> {
        if !self.es.contains_key(&pid) {
            return Err(MuxError::PidNotFound(pid));
        }

        // a random-access point on the PCR PID must be preceded by tables
        let force_tables = pid == self.pmt.pcr_pid
            && adaptation_field.map_or(false, |af| af.random_access);
        let mut written = self.retransmit_tables(force_tables)?;

        let ctx = self
            .es
            .get_mut(&pid)
            .ok_or(MuxError::PidNotFound(pid))?;

        let mut pes = header.clone();
        if pes.stream_id == 0 {
            pes.stream_id = ctx.stream_type.pes_stream_id();
        }

        let mut caller_af = adaptation_field.cloned();
        let mut payload_start = true;
        let mut payload_written = 0;

        while payload_written < payload.len() {
            let mut ts_header = TsHeader::new(pid);
            ts_header.continuity_counter = ctx.cc.next();

            let mut packet_af = caller_af.take();
            let af_size = packet_af.as_ref().map_or(0, |af| af.total_size());
            let mut bytes_available = (self.packet_size - TsHeader::SIZE)
                .checked_sub(af_size)
                .ok_or(MuxError::PacketOverflow(TsHeader::SIZE + af_size))?;

            if payload_start {
                let pes_header_size = pes.size();
                if bytes_available < pes_header_size {
                    // The adaptation field leaves no room for the PES header.
                    // Pad this packet out entirely with stuffing and start
                    // the unit in the next one, which carries no caller AF.
                    if let Some(af) = packet_af.as_mut() {
                        af.stuffing_length = bytes_available;
                    }
                    ts_header.adaptation_field_control =
                        AdaptationFieldControl::AdaptationFieldOnly;
                    written +=
                        write_packet(&mut self.writer, &ts_header, packet_af.as_ref(), &[])?;
                    self.packets_written += 1;
                    continue;
                }
                ts_header.payload_unit_start = true;
            }

            self.scratch.clear();
            let (pes_bytes, consumed) = write_pes_data(
                &mut self.scratch,
                &pes,
                &payload[payload_written..],
                payload_start,
                bytes_available,
            )?;
            payload_written += consumed;
            bytes_available -= pes_bytes;

            // Left-over space becomes adaptation-field stuffing ahead of the
            // payload. Trailing 0xFF is never an option: PES units commonly
            // have unspecified length, so a demuxer would read it as data.
            if bytes_available > 0 {
                match packet_af.as_mut() {
                    Some(af) => af.stuffing_length += bytes_available,
                    None => packet_af = Some(AdaptationField::stuffing(bytes_available)),
                }
            }

            ts_header.adaptation_field_control = if packet_af.is_some() {
                AdaptationFieldControl::AdaptationFieldAndPayload
            } else {
                AdaptationFieldControl::PayloadOnly
            };

            written += write_packet(
                &mut self.writer,
                &ts_header,
                packet_af.as_ref(),
                &self.scratch,
            )?;
            self.packets_written += 1;
            payload_start = false;
        }

        Ok(written)
    }

    /// Write the PAT and PMT packets, regenerating any invalid cache.
    ///
    /// Returns the number of bytes delivered to the sink.
    pub fn write_tables(&mut self) -> Result<usize> {
        if self.pat_packet.len() != self.packet_size {
            self.generate_pat()?;
        }
        if self.pmt_packet.len() != self.packet_size {
            self.generate_pmt()?;
        }

        let mut written = 0;

        // continuity advances on every emission, so the cached packet's CC
        // nibble is patched in place
        let cc = self.pat_cc.next();
        self.pat_packet[3] = (self.pat_packet[3] & 0xF0) | cc;
        self.writer.write_all(&self.pat_packet)?;
        written += self.pat_packet.len();
        self.packets_written += 1;

        let cc = self.pmt_cc.next();
        self.pmt_packet[3] = (self.pmt_packet[3] & 0xF0) | cc;
        self.writer.write_all(&self.pmt_packet)?;
        written += self.pmt_packet.len();
        self.packets_written += 1;

        Ok(written)
    }

    /// Count a payload write and emit tables when the period elapses or
    /// `force` is set.
    fn retransmit_tables(&mut self, force: bool) -> Result<usize> {
        self.tables_retransmit_counter += 1;
        if !force && self.tables_retransmit_counter < self.config.tables_retransmit_period {
            return Ok(0);
        }

        let written = self.write_tables()?;
        self.tables_retransmit_counter = 0;
        Ok(written)
    }

    fn generate_pat(&mut self) -> Result<()> {
        let version = self.pat_version.next();
        let pat = self
            .program_map
            .to_pat(self.config.transport_stream_id, version);
        tracing::trace!(version, "regenerated PAT");
        Self::cache_table_packet(&mut self.pat_packet, PID_PAT, &pat.serialize())
    }

    fn generate_pmt(&mut self) -> Result<()> {
        let pcr_pid = self.pmt.pcr_pid;
        if !self.pmt.streams.iter().any(|es| es.pid == pcr_pid) {
            return Err(MuxError::PcrPidInvalid(pcr_pid));
        }

        self.pmt.version_number = self.pmt_version.next();
        tracing::trace!(version = self.pmt.version_number, "regenerated PMT");
        Self::cache_table_packet(&mut self.pmt_packet, PID_PMT, &self.pmt.serialize())
    }

    /// Wrap a PSI section into a single cached transport packet.
    ///
    /// On failure the cache is left shorter than a packet, which forces
    /// regeneration on the next attempt.
    fn cache_table_packet(packet: &mut Vec<u8>, pid: u16, section: &[u8]) -> Result<()> {
        packet.clear();

        // pointer field plus section must fit one packet's payload
        if 1 + section.len() > TS_PACKET_SIZE - TsHeader::SIZE {
            return Err(MuxError::SectionTooLarge(section.len()));
        }

        let mut header = TsHeader::new(pid);
        header.payload_unit_start = true;

        let mut payload = Vec::with_capacity(1 + section.len());
        payload.push(0x00); // pointer field: the section starts immediately
        payload.extend_from_slice(section);

        write_packet(packet, &header, None, &payload)?;
        Ok(())
    }

    /// Number of transport packets delivered to the sink so far.
    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Number of bytes delivered to the sink so far.
    ///
    /// Unlike the per-call return values, this also counts packets written
    /// before a failed call aborted.
    pub fn bytes_written(&self) -> u64 {
        self.packets_written * TS_PACKET_SIZE as u64
    }

    /// Consume the muxer, returning the sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
