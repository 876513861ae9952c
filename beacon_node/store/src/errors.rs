use ssz::DecodeError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// A stored value failed to deserialize. Fatal: the database is corrupt.
    SszDecodeError(DecodeError),
    /// The underlying database reported a failure. Propagated, never
    /// silently retried.
    DBError { message: String },
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Error {
        Error::SszDecodeError(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::SszDecodeError(e) => write!(f, "corrupt encoding in database: {:?}", e),
            Error::DBError { message } => write!(f, "database error: {}", message),
        }
    }
}
