pub mod admin;
pub mod bind;
pub mod debug;
pub mod info;
pub mod new_session;

pub use admin::AdminCommandHandler;
pub use bind::BindCommandHandler;
pub use debug::DebugCommandHandler;
pub use info::InfoCommandHandler;
pub use new_session::NewSessionCommandHandler;
