pub mod cookie;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod server;
pub mod state;

pub use cookie::SessionCookies;
pub use error::ChatError;
pub use manager::{Exchange, FallbackReason, Manager, Reply};
pub use server::{router, run_server, spawn_session_sweeper};
pub use state::AppState;
