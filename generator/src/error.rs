use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("no insertion point with index {index} (program has {live} live points)")]
    NoSuchPoint { index: usize, live: usize },
    #[error("partition {part} is out of range for {parts} partitions")]
    PartitionOutOfRange { part: usize, parts: usize },
    #[error("combination space is too large to partition")]
    UnboundedSpace,
    #[error("invalid library: {0}")]
    Config(#[from] toml::de::Error),
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = GenError> = std::result::Result<T, E>;
