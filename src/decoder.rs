//! The public decoder façade (§4.5): owns the buffer, the tracks, the tempo/scheduler state, and
//! the synthesizer; exposes `open`/`decode`/`duration`/`position`/`seek`.

use crate::buffer::Buffer;
use crate::error::{DecoderResult, Error};
use crate::io::{FileIoAdapter, IoAdapter, Whence};
use crate::scheduler::{self, Mode, TimeBase};
use crate::smf::{self, parse_header, FileKind};
use crate::synth::{AudioInfo, SoundfontId, Synthesizer};
use crate::track::Track;
use log::debug;
use std::path::Path;

/// A MIDI-to-PCM decoder for one opened file. Not [`Sync`]; [`Send`] exactly when `S` is.
pub struct Decoder<S: Synthesizer> {
    kind: FileKind,
    buffer: Buffer,
    tracks: Vec<Track>,
    time: TimeBase,
    audio: AudioInfo,
    clock_unit_ms: u32,
    duration_us: u64,
    synth: S,
    soundfont: Option<SoundfontId>,
    staging: Vec<u8>,
    buf_pos: usize,
    buf_len: usize,
    event_scratch: Vec<u8>,
    last_decode_error: Option<Error>,
}

impl<S: Synthesizer> Decoder<S> {
    /// Open `path` using the default [`FileIoAdapter`].
    pub fn open(
        path: impl AsRef<Path>,
        synth: S,
        soundfont_path: impl AsRef<Path>,
        audio: AudioInfo,
    ) -> crate::error::Result<Self> {
        Self::open_ex(path, synth, soundfont_path, audio, FileIoAdapter)
    }

    /// Open `path` using a caller-supplied [`IoAdapter`].
    pub fn open_ex<A: IoAdapter>(
        path: impl AsRef<Path>,
        synth: S,
        soundfont_path: impl AsRef<Path>,
        audio: AudioInfo,
        io_adapter: A,
    ) -> crate::error::Result<Self> {
        let mut handle = io_adapter.open(path.as_ref())?;
        let buffer = Buffer::slurp(&io_adapter, &mut handle)?;
        io_adapter.close(handle)?;
        Self::build(buffer, synth, soundfont_path.as_ref(), audio).map_err(Into::into)
    }

    /// Open an already-opened handle; the caller retains ownership and is responsible for
    /// closing it (§5 Resources).
    pub fn open_fd<A: IoAdapter>(
        mut handle: A::Handle,
        synth: S,
        soundfont_path: impl AsRef<Path>,
        audio: AudioInfo,
        io_adapter: A,
    ) -> crate::error::Result<Self> {
        let buffer = Buffer::slurp(&io_adapter, &mut handle)?;
        Self::build(buffer, synth, soundfont_path.as_ref(), audio).map_err(Into::into)
    }

    /// Drop the decoder early. `Drop` does the same work; this exists only for call-site parity
    /// with the distilled spec's explicit `close`.
    pub fn close(self) {
        drop(self)
    }

    fn build(
        mut buffer: Buffer,
        mut synth: S,
        soundfont_path: &Path,
        audio: AudioInfo,
    ) -> DecoderResult<Self> {
        let header = parse_header(&mut buffer)?;

        let mut tracks = Vec::with_capacity(header.num_tracks as usize);
        match header.kind {
            FileKind::Standard => {
                for _ in 0..header.num_tracks {
                    let tag = buffer.read_exact(8)?;
                    if &tag[0..4] != b"MTrk" {
                        return Err(format_err!("expected MTrk chunk tag"));
                    }
                    let length =
                        u32::from_be_bytes([tag[4], tag[5], tag[6], tag[7]]) as usize;
                    let start = buffer.tell();
                    tracks.push(Track::new(start, length));
                    buffer.seek(length as i64, Whence::Current)?;
                }
            }
            FileKind::Dialect => {
                let start = buffer.tell();
                let length = buffer.len() - start;
                tracks.push(Track::new(start, length));
            }
        }

        synth
            .configure(audio)
            .map_err(|e| format_err!("synthesizer configure failed: {}", e))?;
        let soundfont = synth
            .load_soundfont(soundfont_path)
            .map_err(|e| format_err!("soundfont load failed: {}", e))?;

        for track in &mut tracks {
            smf::prime_track(header.kind, &mut buffer, track)?;
        }

        let clock_unit_ms = synth.clock_unit_ms();
        let time = TimeBase::new(header.division);

        let mut decoder = Self {
            kind: header.kind,
            buffer,
            tracks,
            time,
            audio,
            clock_unit_ms,
            duration_us: 0,
            synth,
            soundfont: Some(soundfont),
            staging: Vec::new(),
            buf_pos: 0,
            buf_len: 0,
            event_scratch: Vec::new(),
            last_decode_error: None,
        };

        decoder.prescan()?;
        decoder.reset()?;
        debug!("opened decoder: duration={}ms", decoder.duration());
        Ok(decoder)
    }

    /// Drive the scheduler in [`Mode::Seek`] from tick 0 to end-of-stream, capturing the final
    /// clock value as `duration`.
    fn prescan(&mut self) -> DecoderResult<()> {
        loop {
            match self.step(Mode::Seek)? {
                scheduler::Step::EndOfStream => break,
                scheduler::Step::Advanced { .. } => {}
            }
        }
        self.duration_us = self.time.clock;
        Ok(())
    }

    fn step(&mut self, mode: Mode) -> DecoderResult<scheduler::Step> {
        scheduler::step(
            self.kind,
            &mut self.buffer,
            &mut self.tracks,
            &mut self.time,
            self.clock_unit_ms,
            self.audio,
            mode,
            &mut self.event_scratch,
            &mut self.staging,
            &mut self.synth,
        )
    }

    /// Rewind every track to its start, zero the clock, and reset the synthesizer.
    fn reset(&mut self) -> DecoderResult<()> {
        for track in &mut self.tracks {
            track.reset_cursor();
            smf::prime_track(self.kind, &mut self.buffer, track)?;
        }
        self.time.tick = 0;
        self.time.clock = 0;
        self.time.tempo = 500_000;
        self.time.numerator = 4;
        self.time.denominator = 4;
        self.buf_pos = 0;
        self.buf_len = 0;
        self.synth.system_reset();
        debug!("decoder reset");
        Ok(())
    }

    /// Fill `out` with up to `out.len()` bytes of PCM. Returns the number of bytes written, which
    /// is less than `out.len()` only at end-of-stream. Parsing failures mid-stream degrade to
    /// end-of-stream too (§7); inspect [`Self::last_decode_error`] to tell the two apart.
    pub fn decode(&mut self, out: &mut [u8]) -> usize {
        let mut written = 0;
        while written < out.len() {
            if self.buf_pos >= self.buf_len {
                match self.step(Mode::Play) {
                    Ok(scheduler::Step::EndOfStream) => break,
                    Ok(scheduler::Step::Advanced { frames }) => {
                        self.buf_pos = 0;
                        self.buf_len = frames * self.audio.frame_size();
                        if self.buf_len == 0 {
                            continue;
                        }
                    }
                    Err(e) => {
                        self.last_decode_error = Some(e.into());
                        break;
                    }
                }
            }
            let available = self.buf_len - self.buf_pos;
            let take = available.min(out.len() - written);
            out[written..written + take]
                .copy_from_slice(&self.staging[self.buf_pos..self.buf_pos + take]);
            self.buf_pos += take;
            written += take;
        }
        written
    }

    /// Total duration of the stream, in milliseconds.
    pub fn duration(&self) -> u64 {
        self.duration_us / 1000
    }

    /// Current playback position, in milliseconds.
    pub fn position(&self) -> u64 {
        self.time.clock / 1000
    }

    /// The most recent parsing failure encountered by [`Self::decode`], if any. `decode` itself
    /// never returns an error; this is the opt-in separate error flag (§7).
    pub fn last_decode_error(&self) -> Option<&Error> {
        self.last_decode_error.as_ref()
    }

    /// Seek to `offset_ms` relative to `whence`, clamped to `[0, duration()]`.
    pub fn seek(&mut self, offset_ms: i64, whence: Whence) -> crate::error::Result<()> {
        let duration_ms = self.duration() as i64;
        let current_ms = self.position() as i64;
        let base = match whence {
            Whence::Begin => 0,
            Whence::Current => current_ms,
            Whence::End => duration_ms,
        };
        let target_ms = base.saturating_add(offset_ms).clamp(0, duration_ms);
        let target_us = target_ms as u64 * 1000;

        if target_us < self.time.clock {
            self.reset().map_err(Error::from)?;
        }

        loop {
            if self.time.clock >= target_us {
                break;
            }
            match self.step(Mode::Seek).map_err(Error::from)? {
                scheduler::Step::EndOfStream => break,
                scheduler::Step::Advanced { .. } => {}
            }
        }

        if self.time.clock >= target_us || target_us >= self.duration_us {
            Ok(())
        } else {
            Err(state_err!("seek could not reach the requested target").into())
        }
    }
}

impl<S: Synthesizer> Drop for Decoder<S> {
    fn drop(&mut self) {
        if let Some(id) = self.soundfont.take() {
            let _ = self.synth.unload_soundfont(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::SampleFormat;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        notes_on: Vec<(u8, u8, u8)>,
        notes_off: Vec<(u8, u8)>,
        reset_count: usize,
    }

    struct TestSynth {
        rec: Rc<RefCell<Recorder>>,
    }

    impl Synthesizer for TestSynth {
        type Error = std::convert::Infallible;
        fn configure(&mut self, _audio: AudioInfo) -> Result<(), Self::Error> {
            Ok(())
        }
        fn load_soundfont(&mut self, _path: &Path) -> Result<SoundfontId, Self::Error> {
            Ok(SoundfontId(0))
        }
        fn unload_soundfont(&mut self, _id: SoundfontId) -> Result<(), Self::Error> {
            Ok(())
        }
        fn note_off(&mut self, channel: u8, key: u8) {
            self.rec.borrow_mut().notes_off.push((channel, key));
        }
        fn note_on(&mut self, channel: u8, key: u8, velocity: u8) {
            self.rec.borrow_mut().notes_on.push((channel, key, velocity));
        }
        fn control_change(&mut self, _channel: u8, _controller: u8, _value: u8) {}
        fn program_change(&mut self, _channel: u8, _program: u8) {}
        fn channel_pressure(&mut self, _channel: u8, _value: u8) {}
        fn pitch_bend(&mut self, _channel: u8, _value14: u16) {}
        fn system_reset(&mut self) {
            self.rec.borrow_mut().reset_count += 1;
        }
        fn render(&mut self, frames: usize, out: &mut [u8]) {
            for b in out.iter_mut().take(frames * 2) {
                *b = 1;
            }
        }
    }

    fn audio() -> AudioInfo {
        AudioInfo {
            format: SampleFormat::Pcm16,
            channels: 1,
            sample_rate: 44_100,
        }
    }

    fn minimal_smf0() -> Vec<u8> {
        let mut bytes = b"MThd\x00\x00\x00\x06\x00\x00\x00\x01\x00\x60".to_vec();
        bytes.extend_from_slice(b"MTrk\x00\x00\x00\x04");
        bytes.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        bytes
    }

    struct MemAdapter {
        data: Vec<u8>,
    }

    impl IoAdapter for MemAdapter {
        type Handle = std::io::Cursor<Vec<u8>>;

        fn open(&self, _path: &Path) -> crate::error::Result<Self::Handle> {
            Ok(std::io::Cursor::new(self.data.clone()))
        }
        fn read(&self, handle: &mut Self::Handle, buf: &mut [u8]) -> crate::error::Result<usize> {
            use std::io::Read;
            handle.read(buf).map_err(|e| -> Error { io_err!(e).into() })
        }
        fn seek(
            &self,
            handle: &mut Self::Handle,
            offset: i64,
            whence: Whence,
        ) -> crate::error::Result<u64> {
            use std::io::Seek;
            let pos = match whence {
                Whence::Begin => std::io::SeekFrom::Start(offset as u64),
                Whence::Current => std::io::SeekFrom::Current(offset),
                Whence::End => std::io::SeekFrom::End(offset),
            };
            handle.seek(pos).map_err(|e| -> Error { io_err!(e).into() })
        }
        fn tell(&self, handle: &mut Self::Handle) -> crate::error::Result<u64> {
            use std::io::Seek;
            handle.stream_position().map_err(|e| -> Error { io_err!(e).into() })
        }
        fn close(&self, _handle: Self::Handle) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn open_bytes(bytes: Vec<u8>) -> Decoder<TestSynth> {
        let rec = Rc::new(RefCell::new(Recorder::default()));
        let synth = TestSynth { rec };
        Decoder::open_ex(
            Path::new("memory"),
            synth,
            Path::new("none.sf2"),
            audio(),
            MemAdapter { data: bytes },
        )
        .unwrap()
    }

    #[test]
    fn minimal_file_has_zero_duration_and_empty_decode() {
        let mut decoder = open_bytes(minimal_smf0());
        assert_eq!(0, decoder.duration());
        let mut out = [0u8; 16];
        assert_eq!(0, decoder.decode(&mut out));
    }

    #[test]
    fn seek_past_end_clamps_to_duration() {
        let mut decoder = open_bytes(minimal_smf0());
        decoder.seek(10_000, Whence::Begin).unwrap();
        assert_eq!(decoder.duration(), decoder.position());
    }

    #[test]
    fn smpte_division_is_rejected_at_open() {
        let mut bytes = b"MThd\x00\x00\x00\x06\x00\x00\x00\x01\x80\x00".to_vec();
        bytes.extend_from_slice(b"MTrk\x00\x00\x00\x04");
        bytes.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

        let rec = Rc::new(RefCell::new(Recorder::default()));
        let synth = TestSynth { rec };
        let result = Decoder::open_ex(
            Path::new("memory"),
            synth,
            Path::new("none.sf2"),
            audio(),
            MemAdapter { data: bytes },
        );
        assert!(result.is_err());
    }
}
