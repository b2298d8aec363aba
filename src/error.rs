/// Every recoverable failure the paint core can report.
///
/// None of these are fatal to a session: the UI turns them into ignored
/// gestures, disabled buttons or a status line message.
#[derive(Debug)]
pub enum PaintError {
    /// Pixel access outside `[0, width) × [0, height)`.
    OutOfBounds { x: i64, y: i64, width: u32, height: u32 },
    /// A snapshot of a different size was restored into a buffer.
    DimensionMismatch { expected: (u32, u32), found: (u32, u32) },
    NothingToUndo,
    NothingToRedo,
    /// Text tool cancelled or given blank input.
    EmptyInput,
    /// No usable font could be found for the text tool.
    FontUnavailable,
    /// An image load finished after the buffer was resized or reset.
    StaleImage,
    Image(String),
    Io(std::io::Error),
}

impl std::fmt::Display for PaintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaintError::OutOfBounds { x, y, width, height } => {
                write!(f, "pixel ({}, {}) is outside the {}×{} canvas", x, y, width, height)
            }
            PaintError::DimensionMismatch { expected, found } => write!(
                f,
                "snapshot is {}×{} but the canvas is {}×{}",
                found.0, found.1, expected.0, expected.1
            ),
            PaintError::NothingToUndo => write!(f, "nothing to undo"),
            PaintError::NothingToRedo => write!(f, "nothing to redo"),
            PaintError::EmptyInput => write!(f, "no text entered"),
            PaintError::FontUnavailable => write!(f, "no font available for the text tool"),
            PaintError::StaleImage => {
                write!(f, "image arrived after the canvas changed size; discarded")
            }
            PaintError::Image(e) => write!(f, "image error: {}", e),
            PaintError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for PaintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PaintError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PaintError {
    fn from(e: std::io::Error) -> Self {
        PaintError::Io(e)
    }
}

impl From<image::ImageError> for PaintError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => PaintError::Io(io),
            other => PaintError::Image(other.to_string()),
        }
    }
}
