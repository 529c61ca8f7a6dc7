//! Domain error types.

/// Top-level error type for factorlab.
///
/// Missing data is never an error: factor modules degrade to neutral scores
/// instead. Only configuration problems abort a run.
#[derive(Debug, thiserror::Error)]
pub enum FactorlabError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key} = {value}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("malformed input in {source_name}: {reason}")]
    MalformedInput { source_name: String, reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("insufficient data for {ticker}: have {bars} bars, need {minimum}")]
    InsufficientData {
        ticker: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Universe(#[from] super::universe::UniverseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FactorlabError {
    pub(crate) fn invalid(section: &str, key: &str, value: impl ToString, reason: &str) -> Self {
        FactorlabError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<&FactorlabError> for std::process::ExitCode {
    fn from(err: &FactorlabError) -> Self {
        let code: u8 = match err {
            FactorlabError::Io(_) => 1,
            FactorlabError::ConfigParse { .. }
            | FactorlabError::ConfigMissing { .. }
            | FactorlabError::Universe(_)
            | FactorlabError::ConfigInvalid { .. } => 2,
            FactorlabError::MalformedInput { .. }
            | FactorlabError::NoData { .. }
            | FactorlabError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
