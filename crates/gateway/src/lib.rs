pub mod config;
pub mod error;
pub mod interaction;
pub mod logging;
pub mod page;
pub mod server;
pub mod state;
pub mod upload;

pub use config::GatewayConfig;
pub use error::AppError;
pub use server::{INTERACTION_STATE_HEADER, router, run_server};
pub use state::AppState;
