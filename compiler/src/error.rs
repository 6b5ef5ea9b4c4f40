use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtodefError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {file}:{line}: {msg}")]
    Parse {
        file: String,
        line: usize,
        msg:  String,
    },

    #[error("proto file {0} must declare 'package <Name>;'")]
    MissingPackage(String),

    #[error("Collision: {0}")]
    Collision(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
