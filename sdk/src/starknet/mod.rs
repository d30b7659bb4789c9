pub mod felt;
pub mod address;
pub mod hash;

pub use felt::*;
pub use address::*;
pub use hash::*;
