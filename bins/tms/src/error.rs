#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("store: {0}")]
    Store(#[from] tms_api::StoreError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("output: {0}")]
    Output(#[from] std::io::Error),
}
