//! The real-time capture dialect's event loop and SysEx handling (§4.3.6-§4.3.7). Unlike the
//! standard format there are no VLQ deltas: each event either advances `next_tick` by a fixed
//! amount (a clock pulse, or a dialect SysEx timing-compression packet) or leaves it untouched.

use crate::buffer::Buffer;
use crate::error::DecoderResult;
use crate::io::Whence;
use crate::synth::Synthesizer;
use crate::track::Track;
use log::warn;

/// SysEx packets are bounded to 9 bytes after the leading `F0` (§4.3.7); anything longer without
/// a terminator is dropped.
const MAX_SYSEX_TAIL: usize = 9;

const DIALECT_ID: [u8; 3] = [0x00, 0x00, 0x3A];

fn seek_to_cursor(buffer: &mut Buffer, track: &Track) -> DecoderResult<()> {
    buffer.seek(track.cursor() as i64, Whence::Begin)
}

fn read_byte(buffer: &mut Buffer, track: &mut Track) -> DecoderResult<u8> {
    let b = buffer.read_u8()?;
    track.offset += 1;
    Ok(b)
}

fn read_data<'a>(buffer: &'a mut Buffer, track: &mut Track, n: usize) -> DecoderResult<&'a [u8]> {
    if n == 0 {
        return Ok(&[]);
    }
    let data = buffer.read_exact(n)?;
    track.offset += n;
    Ok(data)
}

/// Decode exactly one dialect event (§4.3.6).
pub(crate) fn decode_event<S: Synthesizer>(
    buffer: &mut Buffer,
    track: &mut Track,
    tempo: &mut u32,
    scratch: &mut Vec<u8>,
    synth: &mut S,
) -> DecoderResult<()> {
    seek_to_cursor(buffer, track)?;

    let first = read_byte(buffer, track)?;
    let status = if first & 0x80 == 0 {
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
        _ if status == 0xF8 => {
            track.next_tick = track.next_tick.saturating_add(1);
        }
        _ => decode_sysex(buffer, track, tempo, scratch)?,
    }

    if track.offset >= track.length {
        track.next_tick = crate::track::END_OF_TRACK;
    }

    Ok(())
}

/// Read a dialect SysEx packet (§4.3.7): `F0` has already been consumed, read up to
/// [`MAX_SYSEX_TAIL`] bytes looking for the terminating `F7`.
fn decode_sysex(buffer: &mut Buffer, track: &mut Track, tempo: &mut u32, scratch: &mut Vec<u8>) -> DecoderResult<()> {
    scratch.clear();
    let mut terminated = false;
    for _ in 0..MAX_SYSEX_TAIL {
        if track.offset >= track.length {
            break;
        }
        let b = read_byte(buffer, track)?;
        if b == 0xF7 {
            terminated = true;
            break;
        }
        scratch.push(b);
    }

    if !terminated {
        // Bounded search failed; drain until we find F7 (or run out of track) and drop the packet.
        warn!("dialect SysEx packet missing F7 terminator within bound, dropping");
        while track.offset < track.length {
            let b = read_byte(buffer, track)?;
            if b == 0xF7 {
                break;
            }
        }
        return Ok(());
    }

    apply_dialect_body(scratch, track, tempo);
    Ok(())
}

fn apply_dialect_body(body: &[u8], track: &mut Track, tempo: &mut u32) {
    if body.len() < 4 || body[0..3] != DIALECT_ID {
        return;
    }
    let packet_type = body[3] & 0x7F;
    match packet_type {
        1 if body.len() >= 6 => {
            let delta = (u64::from(body[5] & 0x7F) << 7) | u64::from(body[4] & 0x7F);
            track.next_tick = track.next_tick.saturating_add(delta);
        }
        t if t >= 7 => {
            track.next_tick = track.next_tick.saturating_add(u64::from(t));
        }
        3 if body.len() >= 7 && body[4] == 2 => {
            let raw = (u32::from(body[6] & 0x7F) << 7) | u32::from(body[5] & 0x7F);
            if raw != 0 {
                *tempo = 60_000_000 / (raw / 10).max(1);
            }
        }
        _ => {}
    }
}
