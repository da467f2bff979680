/*!
The `smf` module is the byte-exact parser for the two binary dialects this crate understands:
Standard MIDI Files (§4.3.1-§4.3.5) and the real-time capture dialect used by an early-1990s
multimedia OS (§4.3.6-§4.3.7). Nothing in here drives time; the scheduler (`crate::scheduler`)
decides *when* to call into this module, this module only decides *what happened* at the current
byte position of one track.
*/

mod dialect;
mod event;
mod header;
mod meta;

pub(crate) use event::MAX_EVENT_PAYLOAD;
pub(crate) use header::{parse_header, FileKind, ParsedHeader};

use crate::buffer::Buffer;
use crate::error::DecoderResult;
use crate::synth::Synthesizer;
use crate::track::{Track, END_OF_TRACK};

/// Decode exactly one event from `track`, advancing its `offset` and `next_tick`, dispatching to
/// the standard or dialect event loop depending on `kind`. Mutates tempo/time-signature state and
/// forwards channel events to `synth`. Leaves `track.next_tick == END_OF_TRACK` once the track's
/// bytes are exhausted.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_one_event<S: Synthesizer>(
    kind: FileKind,
    buffer: &mut Buffer,
    track: &mut Track,
    tempo: &mut u32,
    numerator: &mut u8,
    denominator: &mut u8,
    scratch: &mut Vec<u8>,
    synth: &mut S,
) -> DecoderResult<()> {
    if track.offset >= track.length {
        track.next_tick = END_OF_TRACK;
        return Ok(());
    }
    match kind {
        FileKind::Standard => {
            event::decode_event(buffer, track, tempo, numerator, denominator, scratch, synth)
        }
        FileKind::Dialect => dialect::decode_event(buffer, track, tempo, scratch, synth),
    }
}

/// Position `track`'s initial delta time / next_tick, called once per track at parse time and
/// again on every `reset` (§4.5).
pub(crate) fn prime_track(kind: FileKind, buffer: &mut Buffer, track: &mut Track) -> DecoderResult<()> {
    match kind {
        FileKind::Standard => event::decode_delta(buffer, track),
        FileKind::Dialect => {
            // The dialect has no leading delta time; the first event fires at tick 0.
            track.next_tick = 0;
            let _ = buffer;
            Ok(())
        }
    }
}
