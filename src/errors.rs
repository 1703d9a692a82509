use std::fmt;

#[derive(Debug, Clone)]
pub enum BrandlinkError {
    StorageOperation(String),
    FileOperation(String),
    Serialization(String),
    NotFound(String),
}

impl BrandlinkError {
    pub fn code(&self) -> &'static str {
        match self {
            BrandlinkError::StorageOperation(_) => "E001",
            BrandlinkError::FileOperation(_) => "E002",
            BrandlinkError::Serialization(_) => "E003",
            BrandlinkError::NotFound(_) => "E004",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            BrandlinkError::StorageOperation(_) => "Storage Operation Error",
            BrandlinkError::FileOperation(_) => "File Operation Error",
            BrandlinkError::Serialization(_) => "Serialization Error",
            BrandlinkError::NotFound(_) => "Resource Not Found",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            BrandlinkError::StorageOperation(msg) => msg,
            BrandlinkError::FileOperation(msg) => msg,
            BrandlinkError::Serialization(msg) => msg,
            BrandlinkError::NotFound(msg) => msg,
        }
    }
}

impl fmt::Display for BrandlinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.message())
    }
}

impl std::error::Error for BrandlinkError {}

// 便捷构造函数
impl BrandlinkError {
    pub fn storage_operation<T: Into<String>>(msg: T) -> Self {
        BrandlinkError::StorageOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        BrandlinkError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        BrandlinkError::Serialization(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        BrandlinkError::NotFound(msg.into())
    }
}

impl From<std::io::Error> for BrandlinkError {
    fn from(err: std::io::Error) -> Self {
        BrandlinkError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for BrandlinkError {
    fn from(err: serde_json::Error) -> Self {
        BrandlinkError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BrandlinkError>;
