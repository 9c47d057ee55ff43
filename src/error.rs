//! Error type shared by the pixel buffer and the threshold kernel.

/// Faults that abort a single buffer construction or transform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdError {
    /// The memory layout tag is neither interleaved nor planar.
    InvalidLayout(String),
    /// A derived source channel index is not below the declared channel count.
    ChannelOutOfRange { channel: usize, channels: usize },
    /// Element data does not match the declared size and color space.
    ShapeMismatch { expected: usize, actual: usize },
    /// The channel axis of an adopted array does not match the color model.
    ChannelCountMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for ThresholdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLayout(tag) => write!(f, "invalid pixel order: {tag}"),
            Self::ChannelOutOfRange { channel, channels } => write!(
                f,
                "channel {channel} out of range for a {channels}-channel image"
            ),
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "shape mismatch: expected {expected} elements, got {actual}")
            }
            Self::ChannelCountMismatch { expected, actual } => {
                write!(f, "channel count mismatch: expected {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for ThresholdError {}
