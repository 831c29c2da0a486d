/// Errors produced by the Telegram ingress adapter, kept separate from
/// `ConduitError` because most of these map to a specific webhook response
/// body rather than a generic taxonomy kind.
#[derive(Debug, thiserror::Error)]
pub enum TelegramIngressError {
    #[error("request body is not valid JSON")]
    InvalidBody,

    #[error("webhook secret mismatch")]
    SecretMismatch,

    #[error("attachment exceeds the maximum size of {0} bytes")]
    AttachmentTooLarge(u64),

    #[error(transparent)]
    Bus(#[from] conduit_bus::BusError),

    #[error(transparent)]
    ObjectStore(#[from] crate::media::ObjectStoreError),
}
