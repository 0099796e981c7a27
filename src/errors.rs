#[derive(Debug)]
pub enum RiverbedError {
    NotFound(String),
    AlreadyExists(String),
    Duplicate(String),
    MissingAttribute(String),
    CalendarError(String),
    DataError(String),
    CorruptRecord(String),
    NotImplemented(String),
    IoError(std::io::Error),
    CatalogError(String),
}

impl std::fmt::Display for RiverbedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiverbedError::NotFound(msg) => write!(f, "Not found: {}", msg),
            RiverbedError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            RiverbedError::Duplicate(msg) => write!(f, "Already exists: '{}'", msg),
            RiverbedError::MissingAttribute(msg) => write!(f, "Missing attribute: {}", msg),
            RiverbedError::CalendarError(msg) => write!(f, "Calendar error: {}", msg),
            RiverbedError::DataError(msg) => write!(f, "Data error: {}", msg),
            RiverbedError::CorruptRecord(msg) => write!(f, "Corrupt record: {}", msg),
            RiverbedError::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            RiverbedError::IoError(e) => write!(f, "IO error: {}", e),
            RiverbedError::CatalogError(msg) => write!(f, "Catalog error: {}", msg),
        }
    }
}

impl std::error::Error for RiverbedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RiverbedError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RiverbedError {
    fn from(error: std::io::Error) -> Self {
        RiverbedError::IoError(error)
    }
}

impl From<rusqlite::Error> for RiverbedError {
    fn from(error: rusqlite::Error) -> Self {
        RiverbedError::CatalogError(error.to_string())
    }
}

impl From<RiverbedError> for String {
    fn from(error: RiverbedError) -> Self {
        format!("{}", error)
    }
}
