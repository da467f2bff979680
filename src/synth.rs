//! The synthesizer collaborator (§1): a MIDI-event sink that also renders interleaved PCM.

/// Sample format a [`Synthesizer`] is configured to render, replacing the original's function
/// pointer over two write functions (§9 Design Notes) with a tagged enum matched at render time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SampleFormat {
    /// Signed 16-bit PCM.
    Pcm16,
    /// 32-bit IEEE float PCM.
    Float32,
}

impl SampleFormat {
    /// Bytes occupied by one sample in this format.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Pcm16 => 2,
            SampleFormat::Float32 => 4,
        }
    }
}

/// Audio output configuration: `{bps, channels, sample_rate}` from §6.
#[derive(Clone, Copy, Debug)]
pub struct AudioInfo {
    pub format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioInfo {
    /// Bytes per interleaved audio frame (`channels * bytes_per_sample`).
    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }
}

/// Opaque handle to a soundfont loaded into a [`Synthesizer`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SoundfontId(pub(crate) i32);

/// The synthesizer collaborator. A decoder owns exactly one of these, feeds it MIDI events in
/// tick order, and periodically asks it to render PCM frames.
///
/// Implementations may assume calls arrive in the order the decoder issues them and that
/// `render` is never called reentrantly.
pub trait Synthesizer {
    type Error: std::fmt::Display;

    fn configure(&mut self, audio: AudioInfo) -> Result<(), Self::Error>;

    fn load_soundfont(&mut self, path: &std::path::Path) -> Result<SoundfontId, Self::Error>;
    fn unload_soundfont(&mut self, id: SoundfontId) -> Result<(), Self::Error>;

    fn note_off(&mut self, channel: u8, key: u8);
    fn note_on(&mut self, channel: u8, key: u8, velocity: u8);
    fn control_change(&mut self, channel: u8, controller: u8, value: u8);
    fn program_change(&mut self, channel: u8, program: u8);
    fn channel_pressure(&mut self, channel: u8, value: u8);
    fn pitch_bend(&mut self, channel: u8, value14: u16);
    fn system_reset(&mut self);

    /// Render `frames` interleaved audio frames into `out`, which is exactly
    /// `frames * audio.frame_size()` bytes long.
    fn render(&mut self, frames: usize, out: &mut [u8]);

    /// Minimum note-length value ("clock unit") in milliseconds; bounds the scheduler's maximum
    /// render chunk (§4.4). Implementations that have no such notion should return a sensible
    /// default (the original defaults to 10ms, see §3).
    fn clock_unit_ms(&self) -> u32 {
        10
    }
}
