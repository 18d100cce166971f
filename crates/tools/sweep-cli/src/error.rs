//! CLI error types.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] sweep_core::error::Error),

    #[error(transparent)]
    Params(#[from] sweep_params::error::Error),

    #[error(transparent)]
    Capture(#[from] sweep_capture::error::Error),

    #[error(transparent)]
    Store(#[from] sweep_store::error::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error("{failed} of {total} instances failed")]
    RunFailed { failed: u64, total: u64 },
}
