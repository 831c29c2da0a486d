pub mod context;
pub mod deployment;
pub mod handler;
pub mod handlers;
pub mod permission_gate;
pub mod router;

pub use context::CommandContext;
pub use handler::{CommandHandler, HandlerOutcome};
pub use router::{CommandRouter, RouteOutcome};
