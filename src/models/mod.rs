pub mod result;
pub mod technology;

pub use result::*;
pub use technology::*;
