use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("window assignment error")]
    WindowAssign,
    #[error("aggregation failure")]
    Aggregation,
    #[error("malformed payload")]
    MalformedPayload,
    #[error("result sink error")]
    ResultSink,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::WindowAssign => 1001,
            Self::Aggregation => 1002,
            Self::MalformedPayload => 1003,
            Self::ResultSink => 1004,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;
