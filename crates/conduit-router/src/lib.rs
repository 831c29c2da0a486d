pub mod delivery;
pub mod format;
pub mod metrics_emit;
pub mod router;

pub use delivery::{parse_telegram_user_id, split_for_telegram, DeliveryError, TelegramSender, WebSender};
pub use format::{Formatter, TelegramFormatter, WebFormatter};
pub use router::{ResponseRouter, RouteFailure, RouteSuccess};
