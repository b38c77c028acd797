pub mod composer;
pub mod submit;

pub use composer::*;
pub use submit::*;
