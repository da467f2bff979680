//! Header parsing and dialect dispatch (§4.3.1-§4.3.2).

use crate::buffer::Buffer;
use crate::error::DecoderResult;
use log::{debug, trace};

/// `format ∈ {0, 1, dialect}` from §3. SMF format 2 and the dialect both carry no `Format`
/// distinction of their own: format 2 is rejected outright, and the dialect has exactly one
/// implicit track.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Format {
    Single,
    Multi,
}

/// Which binary dialect this file is (§4.3.1): a Standard MIDI File, or the real-time capture
/// dialect used by an early-1990s multimedia OS.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FileKind {
    Standard,
    Dialect,
}

/// The result of parsing a file's preamble: enough to start walking tracks.
pub(crate) struct ParsedHeader {
    pub(crate) kind: FileKind,
    pub(crate) format: Format,
    pub(crate) division: u16,
    pub(crate) num_tracks: u16,
}

const DIALECT_PREFIX: [u8; 7] = [0xF0, 0x00, 0x00, 0x3A, 0x03, 0x01, 0x18];

/// Dispatch at open time (§4.3.1): sniff the first bytes of the buffer to decide whether this is
/// a Standard MIDI File or the real-time capture dialect, then parse the rest of the preamble.
pub(crate) fn parse_header(buf: &mut Buffer) -> DecoderResult<ParsedHeader> {
    buf.seek(0, crate::io::Whence::Begin)?;
    let probe = buf.read_exact(10)?.to_vec();

    if probe[0..7] == DIALECT_PREFIX && probe[8] == 0xF7 && probe[9] == 0xF7 {
        return parse_dialect_preamble(&probe);
    }

    buf.seek(0, crate::io::Whence::Begin)?;
    let tag = buf.read_exact(14)?;
    if &tag[0..8] != b"MThd\x00\x00\x00\x06" {
        return Err(format_err!("not a recognized MIDI file (bad magic)"));
    }
    let format_word = u16::from_be_bytes([tag[8], tag[9]]);
    let num_tracks = u16::from_be_bytes([tag[10], tag[11]]);
    let division_raw = u16::from_be_bytes([tag[12], tag[13]]);

    let format = match format_word {
        0 => Format::Single,
        1 => Format::Multi,
        2 => return Err(format_err!("SMF format 2 is not supported")),
        other => return Err(format_err!("unrecognized SMF format {}", other)),
    };

    if division_raw & 0x8000 != 0 {
        return Err(format_err!(
            "SMPTE-based division is not supported (division = {:#06x})",
            division_raw
        ));
    }
    if division_raw == 0 {
        return Err(format_err!("division must be nonzero"));
    }

    debug!(
        "parsed SMF header: format={:?} tracks={} division={}",
        format, num_tracks, division_raw
    );

    Ok(ParsedHeader {
        kind: FileKind::Standard,
        format,
        division: division_raw,
        num_tracks,
    })
}

/// Parse the dialect preamble's `pp` time-base byte (§4.3.1). `probe` is the 10-byte prefix
/// already matched against [`DIALECT_PREFIX`] plus the two trailing `0xF7`s.
fn parse_dialect_preamble(probe: &[u8]) -> DecoderResult<ParsedHeader> {
    let pp = probe[7] & 0x7F;
    let division = if pp & 0x40 != 0 {
        let denom = ((pp & 0x3F) as u32 + 1) * 3;
        24 / denom
    } else {
        24 * (pp as u32 + 1)
    };
    if division == 0 || division > u16::MAX as u32 {
        return Err(format_err!("dialect time base resolves to an invalid division ({})", division));
    }
    trace!("recognized real-time capture dialect preamble, pp={:#04x} division={}", pp, division);
    Ok(ParsedHeader {
        kind: FileKind::Dialect,
        format: Format::Single,
        division: division as u16,
        num_tracks: 1,
    })
}
