use std::error::Error;
use std::fmt;

/// Error type for job execution.
///
/// Both kinds carry the id of the job that failed. `Fatal` wraps a panic
/// caught while the job was running, so callers of the run/drain paths see a
/// single failure surface.
#[derive(Debug)]
pub enum JobError {
    /// The job's own logic returned an error.
    Execution {
        job: String,
        source: Box<dyn Error + Send + Sync>,
    },
    /// A non-recoverable fault (panic) occurred while running the job.
    Fatal { job: String, message: String },
}

impl JobError {
    pub fn execution(job: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        JobError::Execution {
            job: job.into(),
            source,
        }
    }

    pub fn fatal(job: impl Into<String>, message: impl Into<String>) -> Self {
        JobError::Fatal {
            job: job.into(),
            message: message.into(),
        }
    }

    /// Id of the job that failed.
    pub fn job(&self) -> &str {
        match self {
            JobError::Execution { job, .. } => job,
            JobError::Fatal { job, .. } => job,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, JobError::Fatal { .. })
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::Execution { job, source } => {
                write!(f, "job {} failed: {}", job, source)
            }
            JobError::Fatal { job, message } => {
                write!(f, "job {} aborted by fatal error: {}", job, message)
            }
        }
    }
}

impl Error for JobError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            JobError::Execution { source, .. } => Some(source.as_ref()),
            JobError::Fatal { .. } => None,
        }
    }
}
