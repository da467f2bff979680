//! Meta event parsing (§4.3.5): `FF tt ll data`, with a per-type enforced length table.

use super::event::MAX_EVENT_PAYLOAD;
use crate::buffer::Buffer;
use crate::error::DecoderResult;
use crate::track::Track;
use crate::vlq;
use log::{debug, trace};

const SEQUENCE_NUMBER: u8 = 0x00;
const CHANNEL_PREFIX: u8 = 0x20;
const END_OF_TRACK: u8 = 0x2F;
const SET_TEMPO: u8 = 0x51;
const SMPTE_OFFSET: u8 = 0x54;
const TIME_SIGNATURE: u8 = 0x58;
const KEY_SIGNATURE: u8 = 0x59;
const SEQUENCER_SPECIFIC: u8 = 0x7F;

/// Enforced length for a meta type, or `None` if any length is accepted (text events and the
/// deliberately relaxed sequencer-specific type, §9 Design Notes).
fn enforced_length(meta_type: u8) -> Option<usize> {
    match meta_type {
        SEQUENCE_NUMBER => Some(2),
        CHANNEL_PREFIX => Some(1),
        END_OF_TRACK => Some(0),
        SET_TEMPO => Some(3),
        SMPTE_OFFSET => Some(5),
        TIME_SIGNATURE => Some(4),
        KEY_SIGNATURE => Some(2),
        0x01..=0x07 => None,
        SEQUENCER_SPECIFIC => None,
        _ => None,
    }
}

/// Decode one meta event (the `FF` status byte has already been consumed by the caller).
pub(crate) fn decode(
    buffer: &mut Buffer,
    track: &mut Track,
    tempo: &mut u32,
    numerator: &mut u8,
    denominator: &mut u8,
    scratch: &mut Vec<u8>,
) -> DecoderResult<()> {
    let meta_type = buffer.read_u8()?;
    track.offset += 1;

    let (len, consumed) = vlq::decode(|| {
        let b = buffer.read_u8()?;
        track.offset += 1;
        Ok(b)
    })?;
    let _ = consumed;
    let len = len as usize;

    if let Some(expected) = enforced_length(meta_type) {
        if len != expected {
            return Err(format_err!(
                "meta event type {:#04x} has length {}, expected {}",
                meta_type,
                len,
                expected
            ));
        }
    }
    if len > MAX_EVENT_PAYLOAD {
        return Err(format_err!(
            "meta event payload of {} bytes exceeds the sanity cap",
            len
        ));
    }

    scratch.clear();
    if len > 0 {
        scratch.resize(len, 0);
        scratch.copy_from_slice(buffer.read_exact(len)?);
        track.offset += len;
    }

    trace!("meta event type={:#04x} len={}", meta_type, len);

    match meta_type {
        END_OF_TRACK => {
            if track.offset != track.length {
                return Err(format_err!(
                    "end-of-track meta event did not land at the track boundary ({} != {})",
                    track.offset,
                    track.length
                ));
            }
            debug!("end of track at offset {}", track.offset);
        }
        SET_TEMPO => {
            *tempo = (u32::from(scratch[0]) << 16) | (u32::from(scratch[1]) << 8) | u32::from(scratch[2]);
            debug!("tempo change: {} microseconds per quarter note", tempo);
        }
        TIME_SIGNATURE => {
            *numerator = scratch[0];
            *denominator = 1u8.checked_shl(u32::from(scratch[1])).unwrap_or(0);
            debug!("time signature: {}/{}", numerator, denominator);
        }
        _ => {}
    }

    Ok(())
}
