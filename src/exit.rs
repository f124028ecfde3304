use std::fmt;

use crate::error::{ErrorKind, RescueError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    InvalidArgs,
    Failed,
    NetworkFailed,
    ParseFailed,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::InvalidArgs => 2,
            ExitCode::Failed => 10,
            ExitCode::NetworkFailed => 20,
            ExitCode::ParseFailed => 30,
        }
    }
}

#[derive(Debug)]
pub struct ExitError {
    pub code: ExitCode,
    pub err: anyhow::Error,
}

impl ExitError {
    pub fn new(code: ExitCode, err: anyhow::Error) -> Self {
        Self { code, err }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.err.as_ref())
    }
}

pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        return exit.code.as_i32();
    }
    if let Some(rescue) = err.downcast_ref::<RescueError>() {
        return code_for_kind(rescue.kind()).as_i32();
    }
    ExitCode::Failed.as_i32()
}

pub fn code_for_kind(kind: ErrorKind) -> ExitCode {
    match kind {
        ErrorKind::Validation => ExitCode::InvalidArgs,
        ErrorKind::Storage => ExitCode::Failed,
        ErrorKind::Network => ExitCode::NetworkFailed,
        ErrorKind::Parse => ExitCode::ParseFailed,
    }
}

pub fn invalid_args(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, anyhow::anyhow!(message.into())).into()
}

pub fn invalid_args_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, err).into()
}
