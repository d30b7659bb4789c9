pub mod curve;
pub mod keys;
pub mod dksap;
pub mod ecdsa;

pub use curve::*;
pub use keys::*;
pub use dksap::*;
pub use ecdsa::*;
