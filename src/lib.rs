//! Decodes Standard MIDI Files, and a real-time capture dialect used by an early-1990s
//! multimedia OS, into a linear PCM sample stream.
//!
//! A [`Decoder`] owns a caller-supplied [`Synthesizer`](synth::Synthesizer): it parses the file's
//! events in tick order, feeds them to the synthesizer, and pulls rendered PCM through
//! [`Decoder::decode`] in whatever chunk size the caller asks for. Seeking, duration, and current
//! playback position are all expressed in milliseconds.
//!
//! ```no_run
//! use midi_decode::{AudioInfo, Decoder, SampleFormat, Synthesizer};
//! # struct MySynth;
//! # impl Synthesizer for MySynth {
//! #     type Error = std::convert::Infallible;
//! #     fn configure(&mut self, _: AudioInfo) -> Result<(), Self::Error> { Ok(()) }
//! #     fn load_soundfont(&mut self, _: &std::path::Path) -> Result<midi_decode::SoundfontId, Self::Error> { Ok(Default::default()) }
//! #     fn unload_soundfont(&mut self, _: midi_decode::SoundfontId) -> Result<(), Self::Error> { Ok(()) }
//! #     fn note_off(&mut self, _: u8, _: u8) {}
//! #     fn note_on(&mut self, _: u8, _: u8, _: u8) {}
//! #     fn control_change(&mut self, _: u8, _: u8, _: u8) {}
//! #     fn program_change(&mut self, _: u8, _: u8) {}
//! #     fn channel_pressure(&mut self, _: u8, _: u8) {}
//! #     fn pitch_bend(&mut self, _: u8, _: u16) {}
//! #     fn system_reset(&mut self) {}
//! #     fn render(&mut self, _: usize, _: &mut [u8]) {}
//! # }
//! let audio = AudioInfo { format: SampleFormat::Pcm16, channels: 2, sample_rate: 44_100 };
//! let mut decoder = Decoder::open("song.mid", MySynth, "instruments.sf2", audio)?;
//! let mut pcm = vec![0u8; 4096];
//! let n = decoder.decode(&mut pcm);
//! # Ok::<(), midi_decode::Error>(())
//! ```

#![allow(dead_code)]

#[macro_use]
mod error;

mod buffer;
mod decoder;
mod scheduler;
mod smf;
mod track;
mod vlq;

pub mod io;
pub mod synth;

pub use decoder::Decoder;
pub use error::{Error, Result};
pub use io::{FileIoAdapter, IoAdapter, Whence};
pub use synth::{AudioInfo, SampleFormat, SoundfontId, Synthesizer};
