pub mod error;
pub mod media;
pub mod metrics_emit;
pub mod sender;
pub mod update;
pub mod webhook;

pub use error::TelegramIngressError;
pub use media::{InMemoryObjectStore, MediaOutcome, ObjectStore, ObjectStoreError};
pub use sender::BotTelegramSender;
pub use update::{MediaKindTag, MediaRef, ParseOutcome, ParsedUpdate};
pub use webhook::{webhook_router, TelegramState};
