use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrewError>;

#[derive(Debug, Error)]
pub enum CrewError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Delivery failed on topic '{topic}': {message}")]
    Bus { topic: String, message: String },

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrewError {
    pub fn bus(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bus {
            topic: topic.into(),
            message: message.into(),
        }
    }
}
