pub mod operators;
pub use operators::*;

pub mod constant;
pub use constant::*;

pub mod function;
pub use function::*;

pub mod binding;
pub use binding::*;

pub mod expr;
pub use expr::*;

pub mod command_tree;
pub use command_tree::*;
