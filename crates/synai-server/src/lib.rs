pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod state;

pub use config::{LogFormat, RelayConfig};
pub use handlers::router;
pub use state::AppState;
