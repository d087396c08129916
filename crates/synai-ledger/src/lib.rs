pub mod entry;
pub mod traits;

#[cfg(feature = "memory-ledger")]
pub mod memory;

pub use entry::*;
pub use traits::*;

#[cfg(feature = "memory-ledger")]
pub use memory::*;
