//! The tempo/tick scheduler (§4.4): merges every track's event stream onto a single tick axis,
//! converts elapsed ticks to elapsed microseconds using the tempo in force, and decides how many
//! PCM frames (if any) a scheduler step is worth.

use crate::buffer::Buffer;
use crate::error::DecoderResult;
use crate::smf::{self, FileKind};
use crate::synth::{AudioInfo, Synthesizer};
use crate::track::{Track, END_OF_TRACK};
use log::trace;

/// Microseconds per second; the fixed point every tick/tempo/clock computation in this module is
/// anchored to.
const CLOCK_BASE: u64 = 1_000_000;

/// Whether a scheduler step should render audio.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Mode {
    Play,
    Seek,
}

/// Outcome of one scheduler step.
pub(crate) enum Step {
    /// The timeline advanced; `frames` PCM frames were rendered into the caller-provided buffer
    /// (always 0 in [`Mode::Seek`]).
    Advanced { frames: usize },
    /// Every track has reached [`END_OF_TRACK`]; there is nothing more to decode.
    EndOfStream,
}

/// Mutable tempo/timebase state the scheduler threads through every track (§3 Decoder state).
pub(crate) struct TimeBase {
    pub(crate) division: u16,
    pub(crate) tempo: u32,
    pub(crate) numerator: u8,
    pub(crate) denominator: u8,
    pub(crate) tick: u64,
    pub(crate) clock: u64,
}

impl TimeBase {
    pub(crate) fn new(division: u16) -> Self {
        Self {
            division,
            tempo: 500_000,
            numerator: 4,
            denominator: 4,
            tick: 0,
            clock: 0,
        }
    }

    fn ticks_per_sec(&self) -> u64 {
        u64::from(self.division) * CLOCK_BASE / u64::from(self.tempo)
    }
}

/// Run a single scheduler step (§4.4 algorithm). `out` is only written to in [`Mode::Play`], and
/// must be at least as large as the frame count the step decides to render (the caller sizes it
/// after computing the same `Δ`, or over-allocates; here we write directly into a caller-supplied
/// scratch and report how many bytes of it were used via `Step::Advanced`).
#[allow(clippy::too_many_arguments)]
pub(crate) fn step<S: Synthesizer>(
    kind: FileKind,
    buffer: &mut Buffer,
    tracks: &mut [Track],
    time: &mut TimeBase,
    clock_unit_ms: u32,
    audio: AudioInfo,
    mode: Mode,
    event_scratch: &mut Vec<u8>,
    pcm_scratch: &mut Vec<u8>,
    synth: &mut S,
) -> DecoderResult<Step> {
    for track in tracks.iter_mut() {
        if track.next_tick <= time.tick && !track.is_ended() {
            smf::decode_one_event(
                kind,
                buffer,
                track,
                &mut time.tempo,
                &mut time.numerator,
                &mut time.denominator,
                event_scratch,
                synth,
            )?;
        }
    }

    let min_next = tracks.iter().map(|t| t.next_tick).min().unwrap_or(END_OF_TRACK);
    if min_next == END_OF_TRACK {
        return Ok(Step::EndOfStream);
    }

    // `division * CLOCK_BASE / tempo` truncates to 0 for a pathological but valid
    // division/tempo pair (e.g. division=1, tempo > 1_000_000); floor it at 1 tick/sec
    // rather than divide by zero below.
    let ticks_per_sec = time.ticks_per_sec().max(1);
    let clock_unit_us = u64::from(clock_unit_ms) * 1000;
    let mut delta = ticks_per_sec * clock_unit_us / CLOCK_BASE;
    if delta == 0 {
        delta = 1;
    }
    if time.tick + delta > min_next {
        delta = min_next - time.tick;
    }

    let frames = if mode == Mode::Play {
        let frame_count = (delta * u64::from(audio.sample_rate) / ticks_per_sec) as usize;
        let bytes = frame_count * audio.frame_size();
        pcm_scratch.clear();
        pcm_scratch.resize(bytes, 0);
        synth.render(frame_count, pcm_scratch.as_mut_slice());
        frame_count
    } else {
        0
    };

    time.tick += delta;
    time.clock += CLOCK_BASE * delta / ticks_per_sec;

    trace!(
        "scheduler step: delta={} tick={} clock={} frames={}",
        delta, time.tick, time.clock, frames
    );

    Ok(Step::Advanced { frames })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Whence;
    use crate::smf::FileKind;

    #[derive(Default)]
    struct SilentSynth;

    impl Synthesizer for SilentSynth {
        type Error = std::convert::Infallible;
        fn configure(&mut self, _audio: AudioInfo) -> Result<(), Self::Error> {
            Ok(())
        }
        fn load_soundfont(
            &mut self,
            _path: &std::path::Path,
        ) -> Result<crate::synth::SoundfontId, Self::Error> {
            Ok(crate::synth::SoundfontId(0))
        }
        fn unload_soundfont(&mut self, _id: crate::synth::SoundfontId) -> Result<(), Self::Error> {
            Ok(())
        }
        fn note_off(&mut self, _channel: u8, _key: u8) {}
        fn note_on(&mut self, _channel: u8, _key: u8, _velocity: u8) {}
        fn control_change(&mut self, _channel: u8, _controller: u8, _value: u8) {}
        fn program_change(&mut self, _channel: u8, _program: u8) {}
        fn channel_pressure(&mut self, _channel: u8, _value: u8) {}
        fn pitch_bend(&mut self, _channel: u8, _value14: u16) {}
        fn system_reset(&mut self) {}
        fn render(&mut self, frames: usize, out: &mut [u8]) {
            for b in out.iter_mut().take(frames * 2) {
                *b = 0;
            }
        }
    }

    #[test]
    fn single_empty_track_reaches_end_of_stream_immediately() {
        let track_bytes = vec![0x00, 0xFF, 0x2F, 0x00];
        let mut buffer = Buffer::from_vec(track_bytes.clone());
        buffer.seek(0, Whence::Begin).unwrap();
        let mut track = Track::new(0, track_bytes.len());
        crate::smf::prime_track(FileKind::Standard, &mut buffer, &mut track).unwrap();

        let mut tracks = [track];
        let mut time = TimeBase::new(96);
        let audio = AudioInfo {
            format: crate::synth::SampleFormat::Pcm16,
            channels: 1,
            sample_rate: 44_100,
        };
        let mut event_scratch = Vec::new();
        let mut pcm_scratch = Vec::new();
        let mut synth = SilentSynth;

        let result = step(
            FileKind::Standard,
            &mut buffer,
            &mut tracks,
            &mut time,
            10,
            audio,
            Mode::Seek,
            &mut event_scratch,
            &mut pcm_scratch,
            &mut synth,
        )
        .unwrap();

        assert!(matches!(result, Step::EndOfStream));
        assert_eq!(0, time.clock);
    }

    #[test]
    fn seek_mode_produces_no_frames() {
        // delta 0, note-on; delta=division (one quarter note of silence); end of track.
        let mut track_bytes = vec![0x00, 0x90, 0x3C, 0x40];
        track_bytes.extend_from_slice(&[0x60, 0xFF, 0x2F, 0x00]);
        let mut buffer = Buffer::from_vec(track_bytes.clone());
        let mut track = Track::new(0, track_bytes.len());
        crate::smf::prime_track(FileKind::Standard, &mut buffer, &mut track).unwrap();

        let mut tracks = [track];
        let mut time = TimeBase::new(96);
        let audio = AudioInfo {
            format: crate::synth::SampleFormat::Pcm16,
            channels: 1,
            sample_rate: 44_100,
        };
        let mut event_scratch = Vec::new();
        let mut pcm_scratch = Vec::new();
        let mut synth = SilentSynth;

        let result = step(
            FileKind::Standard,
            &mut buffer,
            &mut tracks,
            &mut time,
            10,
            audio,
            Mode::Seek,
            &mut event_scratch,
            &mut pcm_scratch,
            &mut synth,
        )
        .unwrap();

        match result {
            Step::Advanced { frames } => assert_eq!(0, frames),
            Step::EndOfStream => panic!("expected an advance, not end of stream"),
        }
    }
}
