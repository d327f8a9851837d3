use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Device {0} not found")]
    DeviceNotFound(i64),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Channel send error")]
    ChannelSend,
}

impl Error {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Database(err) => crate::db::is_transient_error(err),
            Error::ChannelSend => true,
            Error::Mqtt(_)
            | Error::Migration(_)
            | Error::Validation(_)
            | Error::DeviceNotFound(_)
            | Error::Json(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
