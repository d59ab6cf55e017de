pub mod parameter;
pub use parameter::*;

pub mod command_builder;
pub use command_builder::*;
