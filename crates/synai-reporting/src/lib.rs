pub mod ranking;
pub mod reporter;

pub use ranking::*;
pub use reporter::*;
