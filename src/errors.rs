use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskGroundError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Accessibility tree malformed: {0}")]
    TreeMalformed(String),

    #[error("Invalid node geometry: {0}")]
    NodeGeometryInvalid(String),

    #[error("Response parse error: {0}")]
    ResponseParse(String),

    #[error("Grounding error: {0}")]
    Grounding(String),

    #[error("Model transport error: {0}")]
    Transport(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl serde::Serialize for DeskGroundError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type DeskGroundResult<T> = Result<T, DeskGroundError>;
