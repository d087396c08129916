pub mod engine;
pub mod request;

pub use engine::*;
pub use request::*;
