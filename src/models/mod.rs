pub mod enums;
pub mod workflow;

pub use enums::*;
pub use workflow::*;
