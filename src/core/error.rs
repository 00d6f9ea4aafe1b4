use crate::core::state::{JobId, JobStatus, NARRATOR_KEY};
use crate::utils::audio::AssemblyError;
use thiserror::Error;

/// Failure of a single remote call made with one credential.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("quota exceeded (RESOURCE_EXHAUSTED): {0}")]
    QuotaExceeded(String),
    #[error("API key not valid: {0}")]
    InvalidCredential(String),
    #[error("remote call failed with status {status}: {message}")]
    Failed { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("response contained no audio")]
    NoAudio,
}

impl RemoteError {
    /// Maps a non-success HTTP response onto the taxonomy.
    pub fn classify(status: u16, body: &str) -> Self {
        if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
            RemoteError::QuotaExceeded(body.to_string())
        } else if body.contains("API key not valid") || body.contains("API_KEY_INVALID") {
            RemoteError::InvalidCredential(body.to_string())
        } else {
            RemoteError::Failed {
                status,
                message: body.to_string(),
            }
        }
    }

    /// Quota and key rejections are tied to one credential; the next one may still work.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RemoteError::QuotaExceeded(_) | RemoteError::InvalidCredential(_)
        )
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Transport(e.without_url().to_string())
    }
}

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("no API keys configured")]
    NoCredentials,
    #[error("all {attempts} API keys are exhausted or invalid (last error: {last})")]
    Exhausted { attempts: usize, last: RemoteError },
    #[error(transparent)]
    Remote(RemoteError),
}

impl RotationError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RotationError::Exhausted { .. })
    }
}

pub const EXHAUSTED_DIAGNOSTIC: &str =
    "All API keys are exhausted or invalid. Check your keys and their quotas.";
pub const DETECTION_DIAGNOSTIC: &str =
    "Could not detect characters automatically. Add them manually.";

/// Failure of a job's synthesis procedure. Recorded on the job, never propagated past it.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("at most two speaking characters are supported, found {0}")]
    TooManySpeakers(usize),
    #[error(transparent)]
    Rotation(#[from] RotationError),
    #[error("segment {segment} returned invalid audio data: {source}")]
    Decode {
        segment: usize,
        #[source]
        source: base64::DecodeError,
    },
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

impl JobError {
    pub fn diagnostic(&self) -> String {
        match self {
            JobError::Rotation(e) if e.is_exhausted() => EXHAUSTED_DIAGNOSTIC.to_string(),
            other => format!("Generation failed: {}", other),
        }
    }
}

pub fn detection_diagnostic(err: &RotationError) -> String {
    if err.is_exhausted() {
        EXHAUSTED_DIAGNOSTIC.to_string()
    } else {
        DETECTION_DIAGNOSTIC.to_string()
    }
}

/// Misuse of the job controller.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("job {0} not found")]
    UnknownJob(JobId),
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("no API keys configured")]
    NoCredentials,
    #[error("a batch run is active")]
    BatchActive,
    #[error("job {0} is processing")]
    JobProcessing(JobId),
    #[error("{0} is not a UTF-8 text file")]
    NotText(String),
    #[error("character map must contain the {} entry", NARRATOR_KEY)]
    MissingNarrator,
    #[error("character name is empty")]
    EmptyCharacterName,
    #[error("character {0} already exists")]
    DuplicateCharacter(String),
    #[error("character {0} not found")]
    UnknownCharacter(String),
    #[error("{0} cannot be removed")]
    ProtectedCharacter(String),
}
