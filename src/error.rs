use snafu::Snafu;

/// The public error type for this crate.
pub struct Error(DecoderError);

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.0, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.0)
    }
}

impl From<DecoderError> for Error {
    fn from(e: DecoderError) -> Self {
        Error(e)
    }
}

impl From<Error> for DecoderError {
    fn from(e: Error) -> Self {
        e.0
    }
}

/// Lets a caller-supplied [`crate::io::IoAdapter`] convert a `std::io::Error` straight into the
/// public error type with `?`, without needing to see the internal [`DecoderError`] enum.
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error(DecoderError::Io {
            site: site!(),
            source: e,
        })
    }
}

/// The public `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The internal `Result` type used while building and driving a decoder.
pub(crate) type DecoderResult<T> = std::result::Result<T, DecoderError>;

/// The internal error enum. `open`/`open_ex`/`open_fd` map this to the public,
/// opaque [`Error`]; everything inside the crate works with this type directly so
/// that `site!()` breadcrumbs stay attached to the exact failing call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum DecoderError {
    /// Upstream read/seek/open/close failure, or a staging-buffer allocation failure.
    #[snafu(display("{}: io error: {}", site, source))]
    Io {
        site: String,
        source: std::io::Error,
    },

    /// Wrong magic, unsupported format, SMPTE division, bad VLQ, bad meta-event length,
    /// missing SysEx terminator, running status with no prior status, etc.
    #[snafu(display("{}: malformed MIDI data: {}", site, description))]
    Format { site: String, description: String },

    /// An invalid argument or an operation attempted from the wrong decoder state
    /// (e.g. `seek` with an unrecognized whence).
    #[snafu(display("{}: invalid argument or state: {}", site, description))]
    State { site: String, description: String },
}

/// `file:line` of the call site, attached to every error for debuggability.
macro_rules! site {
    () => {
        format!("{}:{}", file!(), line!())
    };
}

macro_rules! io_err {
    ($source:expr) => {{
        use snafu::IntoError;
        crate::error::Io { site: site!() }.into_error($source)
    }};
}

macro_rules! format_err {
    ($msg:expr) => {
        crate::error::Format {
            site: site!(),
            description: $msg,
        }
        .build()
    };
    ($fmt:expr, $($arg:expr),+) => {
        crate::error::Format {
            site: site!(),
            description: format!($fmt, $($arg),+),
        }
        .build()
    };
}

macro_rules! state_err {
    ($msg:expr) => {
        crate::error::State {
            site: site!(),
            description: $msg,
        }
        .build()
    };
}
