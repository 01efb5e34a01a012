use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Controlled page error: {0}")]
    Page(String),

    #[error("Chunk parsing error: {0}")]
    ChunkParse(String),

    #[error("A request is already active for this page")]
    ConcurrentRequest,

    #[error("No fenced code block found in the final response")]
    NoCodeBlock,

    #[error("Malformed task definition: {0}")]
    MalformedTask(String),

    #[error("Skill {0} not found")]
    SkillNotFound(String),

    #[error("Skill execution error: {0}")]
    SkillExecution(String),

    #[error("Command channel error: {0}")]
    Command(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Request cancelled")]
    Cancelled,
}

impl serde::Serialize for RelayError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
