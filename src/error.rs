use thiserror::Error;

/// Main error type for the transcoding library
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// A codec device failed to open, configure or process data
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input bytes do not match the declared PCM layout
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resampling would produce zero output samples from non-empty input
    #[error("Resample target is empty: {samples} samples at {input_rate} Hz -> {output_rate} Hz")]
    EmptyResampleTarget {
        samples: usize,
        input_rate: u32,
        output_rate: u32,
    },

    /// The declared track count does not match the tracks supplied
    #[error("Track count mismatch: expected {expected}, got {actual}")]
    TrackCountMismatch { expected: usize, actual: usize },

    /// A mixer track differs in length from the first track
    #[error("Track length mismatch: track {index} has {actual} bytes, expected {expected}")]
    TrackLengthMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Weighted mixing needs exactly one weight per track
    #[error("Weight count mismatch: {weights} weights for {tracks} tracks")]
    WeightCountMismatch { weights: usize, tracks: usize },

    /// Malformed or out-of-range ADTS data
    #[error("ADTS error: {0}")]
    Adts(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation was called in a pipeline state that does not allow it
    #[error("Invalid pipeline state: {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// Data was submitted after `request_stop`
    #[error("Pipeline stop already requested")]
    StopRequested,
}

/// Codec device errors
#[derive(Error, Debug, Clone)]
pub enum CodecError {
    /// No codec device is available for the requested mode
    #[error("Codec device unavailable: {0}")]
    Unavailable(String),

    /// Failure opening or configuring a codec device
    #[error("Failed to open codec: {0}")]
    Open(String),

    /// The requested AAC profile is not supported by this device
    #[error("Unsupported AAC profile: {0}")]
    UnsupportedProfile(String),

    /// The requested channel layout is not supported by this device
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u16),

    /// Failure encoding PCM into AAC
    #[error("Failed to encode frame: {0}")]
    Encode(String),

    /// Failure decoding an AAC access unit
    #[error("Failed to decode packet: {0}")]
    Decode(String),

    /// The device was used after it had been released
    #[error("Codec already released")]
    Released,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TranscodeError>;
