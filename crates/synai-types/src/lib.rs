pub mod agent;
pub mod error;
pub mod job;
pub mod money;

pub use agent::*;
pub use error::*;
pub use job::*;
pub use money::*;

/// Account that funds every settlement leg.
pub const PLATFORM_ACCOUNT: &str = "platform";
/// Account credited with platform fees.
pub const PLATFORM_ADMIN_ACCOUNT: &str = "platform_admin";
