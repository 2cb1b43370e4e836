use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, SlideError>;

#[derive(thiserror::Error, Debug)]
pub enum SlideError {
    #[error("presentation not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("presentation is empty: {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("unsupported presentation format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("{tool} failed: {message}")]
    Toolchain { tool: String, message: String },

    #[error("presentation is locked by another process: {}", .0.display())]
    Busy(PathBuf),

    #[error("conversion produced no image for slide {} of {}", .index + 1, .deck.display())]
    MissingOutput { deck: PathBuf, index: usize },

    #[error("invalid slide index {0}")]
    InvalidIndex(usize),

    #[error("song not found: {0}")]
    SongNotFound(String),

    #[error("worker could not be started: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Watch(#[from] notify_debouncer_mini::notify::Error),
}

impl SlideError {
    pub fn toolchain(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Toolchain {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Errors worth one more attempt after a short pause.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    /// The input file itself is unusable (gone, empty or not a readable
    /// container).
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::MissingInput(_) | Self::EmptyInput(_) | Self::Zip(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_one_based_for_slides() {
        let err = SlideError::MissingOutput {
            deck: PathBuf::from("songs/a.pptx"),
            index: 2,
        };
        assert!(err.to_string().contains("slide 3"));
    }

    #[test]
    fn test_only_busy_is_transient() {
        assert!(SlideError::Busy(PathBuf::from("a.pptx")).is_transient());
        assert!(!SlideError::toolchain("soffice", "exit status 1").is_transient());
        assert!(!SlideError::InvalidIndex(4).is_transient());
    }

    #[test]
    fn test_input_errors() {
        assert!(SlideError::EmptyInput(PathBuf::from("a.pptx")).is_input_error());
        assert!(SlideError::Zip(zip::result::ZipError::FileNotFound).is_input_error());
        assert!(!SlideError::UnsupportedFormat(PathBuf::from("a.key")).is_input_error());
        assert!(!SlideError::toolchain("soffice", "crashed").is_input_error());
    }

    #[test]
    fn test_io_preserves_source() {
        let err: SlideError = std::io::Error::other("boom").into();
        assert!(err.to_string().contains("boom"));
    }
}
