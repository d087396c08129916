pub mod cipher;
pub mod issuer;

pub use cipher::*;
pub use issuer::*;
