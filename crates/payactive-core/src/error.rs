use thiserror::Error;

/// Required settings that are unset or empty, plus settings with unusable values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe_config(.missing, .invalid))]
pub struct ConfigError {
    pub missing: Vec<&'static str>,
    pub invalid: Vec<String>,
}

fn describe_config(missing: &[&str], invalid: &[String]) -> String {
    let mut parts = Vec::with_capacity(2);
    if !missing.is_empty() {
        parts.push(format!("missing required settings: {}", missing.join(", ")));
    }
    if !invalid.is_empty() {
        parts.push(format!("invalid settings: {}", invalid.join(", ")));
    }
    parts.join("; ")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{store} store unavailable: {message}")]
    Unavailable { store: &'static str, message: String },

    #[error("{store} store read failed: {message}")]
    Read { store: &'static str, message: String },

    #[error("write to {path} failed: {message}")]
    Write { path: String, message: String },

    #[error("{store} returned undecodable data: {message}")]
    Decode { store: &'static str, message: String },
}

impl StoreError {
    pub fn unavailable(store: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Unavailable {
            store,
            message: err.to_string(),
        }
    }

    pub fn read(store: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Read {
            store,
            message: err.to_string(),
        }
    }

    pub fn decode(store: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Decode {
            store,
            message: err.to_string(),
        }
    }
}

impl From<object_store::Error> for StoreError {
    fn from(err: object_store::Error) -> Self {
        StoreError::read("login log", err)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid day '{0}': expected YYYY-MM-DD")]
    InvalidDay(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{failed} of {attempted} segment writes failed")]
    Emit { failed: usize, attempted: usize },
}
