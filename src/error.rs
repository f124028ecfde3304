use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Storage,
    Network,
    Parse,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Storage => "storage",
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RescueError {
    #[error("{0}")]
    Validation(String),

    #[error("failed to write `{key}` to {path}")]
    StorageWrite {
        key: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize `{key}`")]
    StorageEncode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Network(String),

    #[error(
        "import file is not valid JSON: {} at line {}, column {}",
        parse_problem(.0),
        .0.line(),
        .0.column()
    )]
    Parse(#[source] serde_json::Error),
}

impl RescueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RescueError::Validation(_) => ErrorKind::Validation,
            RescueError::StorageWrite { .. } | RescueError::StorageEncode { .. } => {
                ErrorKind::Storage
            }
            RescueError::Network(_) => ErrorKind::Network,
            RescueError::Parse(_) => ErrorKind::Parse,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RescueError::Validation(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        RescueError::Network(message.into())
    }
}

fn parse_problem(err: &serde_json::Error) -> &'static str {
    match err.classify() {
        serde_json::error::Category::Eof => "unexpected end of input",
        serde_json::error::Category::Syntax => "syntax error",
        serde_json::error::Category::Data => "unexpected value",
        serde_json::error::Category::Io => "read error",
    }
}

pub type Result<T, E = RescueError> = std::result::Result<T, E>;
