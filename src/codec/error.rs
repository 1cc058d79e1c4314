use fastpfor::FastPForError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{codec}: {source}")]
    FastPfor {
        codec: &'static str,
        #[source]
        source: FastPForError,
    },
}

impl CodecError {
    pub fn fastpfor(codec: &'static str, source: FastPForError) -> Self {
        CodecError::FastPfor { codec, source }
    }

    pub fn codec(&self) -> &'static str {
        match self {
            CodecError::FastPfor { codec, .. } => codec,
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
