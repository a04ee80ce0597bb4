use thiserror::Error;

/// Closed taxonomy of failures the engine can classify, per the error-handling design.
///
/// Runtime verdicts (TLE/MLE/RE) are *not* represented here — they are regular
/// per-test outcomes, not propagated errors. This enum only covers failures that
/// stop a pipeline stage (configuration, compile, sandbox plumbing, checker,
/// grouper, transport).
#[derive(Debug, Error)]
pub enum GraderError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("checker error: {0}")]
    Checker(String),

    #[error("grouper error: {0}")]
    Grouper(String),

    #[error("transport error: {0}")]
    Transport(String),
}
