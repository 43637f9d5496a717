use thiserror::Error;

/// Error taxonomy for the bot core.
///
/// Nothing here is fatal to the process: validation and not-found errors are
/// recovered in the dialog step that produced them, storage errors abort the
/// current step only, and delivery errors are retried by the scheduler.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Storage(#[from] tokio_rusqlite::Error),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("unknown timezone: {0}")]
    Timezone(String),

    #[error("config error: {0}")]
    Config(String),
}
