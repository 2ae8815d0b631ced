use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model backend error: {0}")]
    Model(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Image encoding error: {0}")]
    Encode(String),

    #[error("Actuator error: {0}")]
    Actuator(String),

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;
