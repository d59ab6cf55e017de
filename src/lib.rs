pub mod metadata;
pub use metadata::{Catalog, EntitySet, PrimitiveKind, TypeUsage};

pub mod tree;
pub use tree::{CommandTree, Expr, ExpressionBinding};

pub mod generator;
pub use generator::{CompileError, CompileResult, GeneratedSql, GeneratorConfig, SqlGenerator, StatementKind};

pub mod command;
pub use command::{Command, CommandBuilder, Parameter};
