//! Failure taxonomy for the assembly pipeline.
//!
//! Every variant is fatal. They travel inside `anyhow::Error` so call sites
//! keep `?` and `.context()`, and callers that care about the class use
//! `err.downcast_ref::<PipelineError>()`.

/// Classified pipeline failure.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad or missing manifest, policy or configuration input.
    #[error("configuration error: {0}")]
    Config(String),

    /// A manifest entry could not be bound to a module file.
    #[error("module resolution failed for {module}: {reason}")]
    Resolution { module: String, reason: String },

    /// Staging, metadata generation or packaging failed.
    #[error("build error: {0}")]
    Build(String),

    /// Verified-boot or module signing failed.
    #[error("signing error: {0}")]
    Signing(String),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    pub fn resolution(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            module: module.into(),
            reason: reason.into(),
        }
    }
}

/// Recover the pipeline class of an error chain, if any.
pub fn classify(err: &anyhow::Error) -> Option<&PipelineError> {
    err.chain().find_map(|e| e.downcast_ref::<PipelineError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_classify_through_context() {
        let err: anyhow::Result<()> = Err(PipelineError::build("depmod produced nothing").into());
        let err = err.context("staging vendor_dlkm").unwrap_err();

        assert!(matches!(classify(&err), Some(PipelineError::Build(_))));
        assert!(format!("{:#}", err).contains("depmod produced nothing"));
    }

    #[test]
    fn test_classify_plain_error() {
        let err = anyhow::anyhow!("io failure");
        assert!(classify(&err).is_none());
    }
}
