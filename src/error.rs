use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum NNError {
    // Construction errors
    InvalidConfiguration(String),

    // Forward/backward errors
    ShapeMismatch(String),
    LabelOutOfRange { label: usize, num_classes: usize },

    // File operations
    IoError(std::io::Error),
    SerializationError(Box<bincode::ErrorKind>),
    CsvError(csv::Error),

    ShapeError(ndarray::ShapeError),
}

impl fmt::Display for NNError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NNError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            NNError::ShapeMismatch(msg) => write!(f, "Shape mismatch: {}", msg),
            NNError::LabelOutOfRange { label, num_classes } => {
                write!(f, "Label {} out of range for {} classes", label, num_classes)
            }
            NNError::IoError(err) => write!(f, "I/O error: {}", err),
            NNError::SerializationError(err) => write!(f, "Serialization error: {}", err),
            NNError::CsvError(err) => write!(f, "CSV error: {}", err),
            NNError::ShapeError(err) => write!(f, "Shape error: {}", err),
        }
    }
}

impl From<std::io::Error> for NNError {
    fn from(err: std::io::Error) -> NNError {
        NNError::IoError(err)
    }
}

impl From<Box<bincode::ErrorKind>> for NNError {
    fn from(err: Box<bincode::ErrorKind>) -> NNError {
        NNError::SerializationError(err)
    }
}

impl From<csv::Error> for NNError {
    fn from(err: csv::Error) -> NNError {
        NNError::CsvError(err)
    }
}

impl From<ndarray::ShapeError> for NNError {
    fn from(err: ndarray::ShapeError) -> NNError {
        NNError::ShapeError(err)
    }
}

impl Error for NNError {}

pub type Result<T> = std::result::Result<T, NNError>;
