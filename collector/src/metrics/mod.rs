pub mod descriptor;
pub mod sample;

pub use descriptor::*;
pub use sample::*;
