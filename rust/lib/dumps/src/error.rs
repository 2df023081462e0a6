use thiserror::Error;

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("`{command}` exited with status {status}: {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<std::io::Error> for DumpError {
    fn from(e: std::io::Error) -> Self {
        DumpError::Io(e.to_string())
    }
}
