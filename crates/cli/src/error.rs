use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("request to control plane failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("control plane returned {status}: {body}")]
    Api { status: reqwest::StatusCode, body: String },

    #[error("invalid value for --{flag}: {value}")]
    InvalidArg { flag: &'static str, value: String },

    #[error("failed to serialize request body: {0}")]
    JsonSerialize(#[from] serde_json::Error),
}
