use thiserror::Error;

pub type Result<T> = std::result::Result<T, BusError>;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Duplicate endpoint id: {0}")]
    DuplicateEndpoint(String),

    #[error("Endpoint {endpoint_id} failed to initialize: {cause}")]
    Init {
        endpoint_id: String,
        cause: anyhow::Error,
    },

    #[error("Payload for endpoint {endpoint_id} does not match its item type: {cause}")]
    Payload {
        endpoint_id: String,
        cause: serde_json::Error,
    },

    #[error("Handler for endpoint {endpoint_id} failed: {cause}")]
    Handler {
        endpoint_id: String,
        cause: anyhow::Error,
    },

    #[error("Failed to publish callback envelope: {0}")]
    Publish(anyhow::Error),
}
