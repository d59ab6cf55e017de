pub mod compile_error;
pub use compile_error::*;

pub mod generator_config;
pub use generator_config::*;

pub mod sql_writer;
pub use sql_writer::*;

pub mod rename_context;
pub use rename_context::*;

pub mod symbol;
pub use symbol::*;

pub mod fragment;
pub use fragment::*;

pub mod statement;
pub use statement::*;

pub mod scope_stack;
pub use scope_stack::*;

pub mod key_to_list_map;
pub use key_to_list_map::*;

pub mod literal;

pub mod query_compiler;
pub use query_compiler::*;

pub mod mutation_compiler;
pub use mutation_compiler::*;

pub mod sql_generator;
pub use sql_generator::*;

pub(crate) mod _tests;
