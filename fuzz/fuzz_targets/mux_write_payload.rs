#![no_main]

//! Fuzz target for the muxer facade.
//!
//! Drives arbitrary sequences of stream registration, removal, table and
//! payload writes to find panics, and checks that whatever reaches the sink
//! stays packet-aligned with intact sync bytes.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mpegts_mux::{
    AdaptationField, ElementaryStream, Muxer, MuxerConfig, PesHeader, PesOptionalHeader,
    PesTimestamp, StreamType, PID_MAX, SYNC_BYTE, TS_PACKET_SIZE,
};

const STREAM_TYPES: [StreamType; 6] = [
    StreamType::H264,
    StreamType::H265,
    StreamType::AacAdts,
    StreamType::Ac3,
    StreamType::PrivateData,
    StreamType::Metadata,
];

#[derive(Arbitrary, Debug)]
enum MuxOperation {
    AddStream {
        pid: u16,
        stream_type_index: u8,
        pcr: bool,
    },
    RemoveStream {
        pid: u16,
    },
    WritePayload {
        pid: u16,
        random_access: bool,
        stuffing_length: u16,
        pts: Option<u64>,
        dts: Option<u64>,
        payload: Vec<u8>,
    },
    WriteTables,
}

#[derive(Arbitrary, Debug)]
struct MuxInput {
    period: u16,
    operations: Vec<MuxOperation>,
}

fuzz_target!(|input: MuxInput| {
    if input.operations.len() > 64 {
        return;
    }

    let config = MuxerConfig {
        transport_stream_id: 1,
        tables_retransmit_period: (input.period as usize).max(1),
    };
    let mut muxer = Muxer::new(Vec::new(), config);

    for operation in input.operations {
        match operation {
            MuxOperation::AddStream {
                pid,
                stream_type_index,
                pcr,
            } => {
                let stream_type = STREAM_TYPES[stream_type_index as usize % STREAM_TYPES.len()];
                // Errors (duplicate PIDs) are expected; panics are not.
                let _ = muxer.add_elementary_stream(
                    ElementaryStream::new(pid & PID_MAX, stream_type),
                    pcr,
                );
            }

            MuxOperation::RemoveStream { pid } => {
                let _ = muxer.remove_elementary_stream(pid & PID_MAX);
            }

            MuxOperation::WritePayload {
                pid,
                random_access,
                stuffing_length,
                pts,
                dts,
                payload,
            } => {
                if payload.len() > 16 * 1024 {
                    continue;
                }

                let adaptation_field = AdaptationField {
                    random_access,
                    // oversized fields must be rejected, not panic
                    stuffing_length: stuffing_length as usize % 512,
                    ..AdaptationField::default()
                };

                let optional_header = match (pts, dts) {
                    (Some(pts), Some(dts)) => Some(PesOptionalHeader::with_pts_dts(
                        PesTimestamp::new(pts),
                        PesTimestamp::new(dts),
                    )),
                    (Some(pts), None) => Some(PesOptionalHeader::with_pts(PesTimestamp::new(pts))),
                    _ => None,
                };
                let header = PesHeader {
                    stream_id: 0,
                    packet_length: 0,
                    optional_header,
                };

                let _ = muxer.write_payload(
                    pid & PID_MAX,
                    Some(&adaptation_field),
                    &header,
                    &payload,
                );
            }

            MuxOperation::WriteTables => {
                let _ = muxer.write_tables();
            }
        }
    }

    let stream = muxer.into_inner();
    assert_eq!(stream.len() % TS_PACKET_SIZE, 0, "sink not packet aligned");
    for chunk in stream.chunks(TS_PACKET_SIZE) {
        assert_eq!(chunk[0], SYNC_BYTE, "packet without sync byte");
    }
});
