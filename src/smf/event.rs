//! The standard-format per-track event loop (§4.3.3-§4.3.4): delta times, running status, channel
//! events, and meta events (dispatched to [`super::meta`]).

use super::meta;
use crate::buffer::Buffer;
use crate::error::DecoderResult;
use crate::io::Whence;
use crate::synth::Synthesizer;
use crate::track::Track;
use crate::vlq;
use log::trace;

/// Sanity cap on an event's payload (§9 Design Notes): no well-formed meta/SysEx event is
/// anywhere near this large, and anything claiming to be fails closed rather than allocating
/// unbounded memory from a malformed length field.
pub(crate) const MAX_EVENT_PAYLOAD: usize = 1 << 16;

fn seek_to_cursor(buffer: &mut Buffer, track: &Track) -> DecoderResult<()> {
    buffer.seek(track.cursor() as i64, Whence::Begin)
}

/// Read this track's initial (or next) delta time and fold it into `next_tick`. Called once per
/// track at parse/reset time, and again after every event is decoded.
pub(crate) fn decode_delta(buffer: &mut Buffer, track: &mut Track) -> DecoderResult<()> {
    seek_to_cursor(buffer, track)?;
    let base = track.next_tick;
    let (delta, consumed) = vlq::decode(|| {
        let b = buffer.read_u8()?;
        track.offset += 1;
        Ok(b)
    })?;
    let _ = consumed;
    track.next_tick = base.saturating_add(u64::from(delta));
    Ok(())
}

/// Decode exactly one event at the track's current cursor (§4.3.4), then fold in the next delta
/// time so `next_tick` reflects when the track's *next* event fires.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_event<S: Synthesizer>(
    buffer: &mut Buffer,
    track: &mut Track,
    tempo: &mut u32,
    numerator: &mut u8,
    denominator: &mut u8,
    scratch: &mut Vec<u8>,
    synth: &mut S,
) -> DecoderResult<()> {
    seek_to_cursor(buffer, track)?;

    let first = buffer.read_u8()?;
    track.offset += 1;

    let status = if first & 0x80 == 0 {
        // Running status: this byte is actually the first data byte. Rewind one and reuse the
        // last seen status.
        track.offset -= 1;
        buffer.seek(-1, Whence::Current)?;
        if track.status < 0x80 {
            return Err(format_err!("running status with no prior status byte"));
        }
        track.status
    } else {
        first
    };

    if status < 0xF0 {
        track.status = status;
    }

    trace!("track event: status={:#04x} offset={}", status, track.offset);

    let channel = status & 0x0F;
    match status & 0xF0 {
        0x80 if status < 0xF0 => {
            let data = read_data(buffer, track, 2)?;
            synth.note_off(channel, data[0] & 0x7F);
        }
        0x90 if status < 0xF0 => {
            let data = read_data(buffer, track, 2)?;
            synth.note_on(channel, data[0] & 0x7F, data[1] & 0x7F);
        }
        0xA0 if status < 0xF0 => {
            read_data(buffer, track, 2)?;
        }
        0xB0 if status < 0xF0 => {
            let data = read_data(buffer, track, 2)?;
            synth.control_change(channel, data[0] & 0x7F, data[1] & 0x7F);
        }
        0xC0 if status < 0xF0 => {
            let data = read_data(buffer, track, 1)?;
            synth.program_change(channel, data[0] & 0x7F);
        }
        0xD0 if status < 0xF0 => {
            let data = read_data(buffer, track, 1)?;
            synth.channel_pressure(channel, data[0] & 0x7F);
        }
        0xE0 if status < 0xF0 => {
            let data = read_data(buffer, track, 2)?;
            let value14 = (u16::from(data[1] & 0x7F) << 7) | u16::from(data[0] & 0x7F);
            synth.pitch_bend(channel, value14);
        }
        _ => decode_system_event(status, buffer, track, tempo, numerator, denominator, scratch)?,
    }

    if track.offset >= track.length {
        // An end-of-track meta event (or the last byte of the chunk) landed exactly at the
        // boundary; there is no further delta time to read.
        track.next_tick = crate::track::END_OF_TRACK;
        return Ok(());
    }

    decode_delta(buffer, track)
}

#[allow(clippy::too_many_arguments)]
fn decode_system_event(
    status: u8,
    buffer: &mut Buffer,
    track: &mut Track,
    tempo: &mut u32,
    numerator: &mut u8,
    denominator: &mut u8,
    scratch: &mut Vec<u8>,
) -> DecoderResult<()> {
    match status {
        0xF0 | 0xF7 => {
            read_sysex(buffer, track)?;
        }
        0xFF => meta::decode(buffer, track, tempo, numerator, denominator, scratch)?,
        0xF2 => {
            read_data(buffer, track, 2)?;
        }
        0xF3 => {
            read_data(buffer, track, 1)?;
        }
        // 0xF1, 0xF4-0xF6, 0xF8-0xFE: no data bytes.
        _ => {}
    }
    Ok(())
}

/// Read `n` data bytes at the current cursor, advancing `track.offset`.
fn read_data<'a>(buffer: &'a mut Buffer, track: &mut Track, n: usize) -> DecoderResult<&'a [u8]> {
    if n == 0 {
        return Ok(&[]);
    }
    let data = buffer.read_exact(n)?;
    track.offset += n;
    Ok(data)
}

/// Read a VLQ-prefixed SysEx payload (`F0`/`F7` continuation), requiring it to end with `0xF7`.
fn read_sysex(buffer: &mut Buffer, track: &mut Track) -> DecoderResult<()> {
    let (len, consumed) = vlq::decode(|| {
        let b = buffer.read_u8()?;
        track.offset += 1;
        Ok(b)
    })?;
    let _ = consumed;
    let len = len as usize;
    if len > MAX_EVENT_PAYLOAD {
        return Err(format_err!("SysEx payload of {} bytes exceeds the sanity cap", len));
    }
    if len == 0 {
        return Ok(());
    }
    let payload = read_data(buffer, track, len)?;
    if payload[len - 1] != 0xF7 {
        return Err(format_err!("SysEx event missing terminating 0xF7"));
    }
    Ok(())
}
