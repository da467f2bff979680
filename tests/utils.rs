#![allow(dead_code)]

use log::LevelFilter;
use midi_decode::{AudioInfo, IoAdapter, SampleFormat, SoundfontId, Synthesizer, Whence};
use std::cell::RefCell;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::rc::Rc;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn enable_logging() {
    LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter(None, LevelFilter::Trace)
            .is_test(true)
            .init();
    });
}

pub fn audio_info() -> AudioInfo {
    AudioInfo {
        format: SampleFormat::Pcm16,
        channels: 1,
        sample_rate: 44_100,
    }
}

/// An in-memory [`IoAdapter`], so integration tests never touch the filesystem.
pub struct MemAdapter {
    pub data: Vec<u8>,
}

impl IoAdapter for MemAdapter {
    type Handle = Cursor<Vec<u8>>;

    fn open(&self, _path: &Path) -> midi_decode::Result<Self::Handle> {
        Ok(Cursor::new(self.data.clone()))
    }

    fn read(&self, handle: &mut Self::Handle, buf: &mut [u8]) -> midi_decode::Result<usize> {
        Ok(handle.read(buf)?)
    }

    fn seek(&self, handle: &mut Self::Handle, offset: i64, whence: Whence) -> midi_decode::Result<u64> {
        let pos = match whence {
            Whence::Begin => SeekFrom::Start(offset as u64),
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        Ok(handle.seek(pos)?)
    }

    fn tell(&self, handle: &mut Self::Handle) -> midi_decode::Result<u64> {
        Ok(handle.stream_position()?)
    }

    fn close(&self, _handle: Self::Handle) -> midi_decode::Result<()> {
        Ok(())
    }
}

/// Records every MIDI event delivered to it and renders silent, deterministic PCM, so tests can
/// assert both on delivered events and on the shape of the decoded byte stream.
#[derive(Default)]
pub struct EventLog {
    pub notes_on: Vec<(u8, u8, u8)>,
    pub notes_off: Vec<(u8, u8)>,
    pub resets: usize,
}

#[derive(Clone)]
pub struct FakeSynth {
    pub log: Rc<RefCell<EventLog>>,
}

impl FakeSynth {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(EventLog::default())),
        }
    }
}

impl Synthesizer for FakeSynth {
    type Error = std::convert::Infallible;

    fn configure(&mut self, _audio: AudioInfo) -> Result<(), Self::Error> {
        Ok(())
    }

    fn load_soundfont(&mut self, _path: &Path) -> Result<SoundfontId, Self::Error> {
        Ok(SoundfontId::default())
    }

    fn unload_soundfont(&mut self, _id: SoundfontId) -> Result<(), Self::Error> {
        Ok(())
    }

    fn note_off(&mut self, channel: u8, key: u8) {
        self.log.borrow_mut().notes_off.push((channel, key));
    }

    fn note_on(&mut self, channel: u8, key: u8, velocity: u8) {
        self.log.borrow_mut().notes_on.push((channel, key, velocity));
    }

    fn control_change(&mut self, _channel: u8, _controller: u8, _value: u8) {}
    fn program_change(&mut self, _channel: u8, _program: u8) {}
    fn channel_pressure(&mut self, _channel: u8, _value: u8) {}
    fn pitch_bend(&mut self, _channel: u8, _value14: u16) {}

    fn system_reset(&mut self) {
        self.log.borrow_mut().resets += 1;
    }

    fn render(&mut self, frames: usize, out: &mut [u8]) {
        // Deterministic non-zero fill, so byte-for-byte comparisons across a reset are
        // meaningful (an all-zero buffer would trivially "match" a bug that rendered nothing).
        for (i, b) in out.iter_mut().take(frames * 2).enumerate() {
            *b = (i % 251) as u8;
        }
    }
}

pub fn smf0_header(division: u16) -> Vec<u8> {
    let mut bytes = b"MThd\x00\x00\x00\x06\x00\x00\x00\x01".to_vec();
    bytes.extend_from_slice(&division.to_be_bytes());
    bytes
}

pub fn track_chunk(body: &[u8]) -> Vec<u8> {
    let mut bytes = b"MTrk".to_vec();
    bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
    bytes.extend_from_slice(body);
    bytes
}
