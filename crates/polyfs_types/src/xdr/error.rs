use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// An error occurred while reading or writing data.
    Io(std::io::Error),

    /// An invalid value was encountered for an enum/bool type.
    InvalidEnumValue(u32),

    /// A length prefix or record length did not match the data.
    InvalidLength(usize),

    /// The object is too large to encode.
    ObjectTooLarge(usize),

    /// A string field did not hold valid UTF-8.
    Utf8(std::string::FromUtf8Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::InvalidEnumValue(v) => write!(f, "invalid enum value: {v}"),
            Self::InvalidLength(n) => write!(f, "invalid length: {n}"),
            Self::ObjectTooLarge(n) => write!(f, "object too large: {n}"),
            Self::Utf8(e) => write!(f, "invalid utf-8: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::Utf8(e)
    }
}
