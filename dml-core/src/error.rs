use std::fmt::{Display, Formatter};

/// Enumeration representing the various errors that can occur within dml.
#[derive(Debug)]
pub enum DmlError {
    /// Script is not a valid program, found during validation
    LanguageError(Box<str>),
    /// Error parsing script or data files
    ParseError(Box<str>),
    /// Invalid shapes for operation
    ShapeError(Box<str>),
    /// Error during execution of a valid program
    RuntimeError(Box<str>),
    /// Error from file operations
    IOError(std::io::Error),
}

/// Class of [DmlError], without the message.
/// Used by test harnesses to assert on expected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// [DmlError::LanguageError]
    Language,
    /// [DmlError::ParseError]
    Parse,
    /// [DmlError::ShapeError]
    Shape,
    /// [DmlError::RuntimeError]
    Runtime,
    /// [DmlError::IOError]
    IO,
}

fn with_location(e: Box<str>, location: &std::panic::Location<'_>) -> Box<str> {
    format!(
        "{e}, {}:{}:{}",
        location.file(),
        location.line(),
        location.column()
    )
    .into()
}

impl DmlError {
    /// Language error
    #[track_caller]
    pub fn language_error(e: impl Into<Box<str>>) -> Self {
        Self::LanguageError(with_location(e.into(), std::panic::Location::caller()))
    }

    /// Parse error
    #[track_caller]
    pub fn parse_error(e: impl Into<Box<str>>) -> Self {
        Self::ParseError(with_location(e.into(), std::panic::Location::caller()))
    }

    /// Shape error
    #[track_caller]
    pub fn shape_error(e: impl Into<Box<str>>) -> Self {
        Self::ShapeError(with_location(e.into(), std::panic::Location::caller()))
    }

    /// Runtime error
    #[track_caller]
    pub fn runtime_error(e: impl Into<Box<str>>) -> Self {
        Self::RuntimeError(with_location(e.into(), std::panic::Location::caller()))
    }

    /// Get kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DmlError::LanguageError(_) => ErrorKind::Language,
            DmlError::ParseError(_) => ErrorKind::Parse,
            DmlError::ShapeError(_) => ErrorKind::Shape,
            DmlError::RuntimeError(_) => ErrorKind::Runtime,
            DmlError::IOError(_) => ErrorKind::IO,
        }
    }
}

impl Display for DmlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DmlError::LanguageError(e) => f.write_fmt(format_args!("Language error: {e}")),
            DmlError::ParseError(e) => f.write_fmt(format_args!("Parse error: {e}")),
            DmlError::ShapeError(e) => f.write_fmt(format_args!("Shape error: {e}")),
            DmlError::RuntimeError(e) => f.write_fmt(format_args!("Runtime error: {e}")),
            DmlError::IOError(e) => f.write_fmt(format_args!("IO {e}")),
        }
    }
}

impl std::error::Error for DmlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DmlError::IOError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DmlError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

#[test]
fn error_kind_and_location() {
    let e = DmlError::language_error("Expecting matrix argument for function sum");
    assert_eq!(e.kind(), ErrorKind::Language);
    let msg = e.to_string();
    assert!(msg.starts_with("Language error: Expecting matrix argument"));
    assert!(msg.contains("error.rs"));
    let e: DmlError = std::io::Error::new(std::io::ErrorKind::NotFound, "x").into();
    assert_eq!(e.kind(), ErrorKind::IO);
}
