use serde::Serialize;
use tracing::debug;

use crate::{
    generator::{CompileResult, GeneratorConfig, MutationCompiler, QueryCompiler},
    metadata::PrimitiveKind,
    tree::{CommandTree, ConstantValue},
};

/// How the produced text is to be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatementKind {
    Text,
    StoredProcedure,
}

/// A parameter the compiler introduced, with the constant it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRecord {
    pub name: String,
    pub value: Option<ConstantValue>,
    pub kind: PrimitiveKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSql {
    pub text: String,
    pub columns: Vec<String>,
    pub parameters: Vec<ParameterRecord>,
    pub kind: StatementKind,
}

/// Entry point: turns any command tree into query text.
pub struct SqlGenerator;

impl SqlGenerator {
    pub fn generate(tree: &CommandTree, config: &GeneratorConfig) -> CompileResult<GeneratedSql> {
        debug!(tree = tree.kind_name(), pretty = config.pretty, "generating sql");
        let generated = match tree {
            CommandTree::Query { query, .. } => {
                let compiled = QueryCompiler::new(config).compile(query)?;
                GeneratedSql {
                    text: compiled.text,
                    columns: compiled.columns,
                    parameters: Vec::new(),
                    kind: StatementKind::Text,
                }
            }
            CommandTree::Function { function, command_text, .. } => match command_text {
                Some(text) => GeneratedSql {
                    text: text.clone(),
                    columns: Vec::new(),
                    parameters: Vec::new(),
                    kind: StatementKind::Text,
                },
                None => GeneratedSql {
                    text: QueryCompiler::function_name(function),
                    columns: Vec::new(),
                    parameters: Vec::new(),
                    kind: StatementKind::StoredProcedure,
                },
            },
            CommandTree::Insert(_) | CommandTree::Update(_) | CommandTree::Delete(_) => {
                let compiled = MutationCompiler::new(config).compile(tree)?;
                GeneratedSql {
                    text: compiled.text,
                    columns: Vec::new(),
                    parameters: compiled.parameters,
                    kind: StatementKind::Text,
                }
            }
        };
        debug!(
            kind = ?generated.kind,
            columns = generated.columns.len(),
            parameters = generated.parameters.len(),
            len = generated.text.len(),
            "sql generated"
        );
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        generator::_tests::fixtures::*,
        tree::{DeleteTree, Expr, ExpressionBinding, FunctionMeta},
    };

    #[test]
    fn query_trees_carry_columns() {
        let p = ExpressionBinding::new(Expr::scan(processes()), "p");
        let query = Expr::project(p.clone(), Expr::record(vec![("Name", p.prop("Name"))]));
        let generated = SqlGenerator::generate(&CommandTree::query(query), &GeneratorConfig::default()).unwrap();
        assert_eq!(generated.text, "SELECT p.Name AS Name FROM Win32_Process AS p");
        assert_eq!(generated.columns, vec!["Name"]);
        assert!(generated.parameters.is_empty());
        assert_eq!(generated.kind, StatementKind::Text);
    }

    #[test]
    fn function_with_command_text_is_verbatim() {
        let f = Arc::new(FunctionMeta::store("Restart", int32_type()));
        let tree = CommandTree::function(f, Some("CALL Restart(@Name)"));
        let generated = SqlGenerator::generate(&tree, &GeneratorConfig::default()).unwrap();
        assert_eq!(generated.text, "CALL Restart(@Name)");
        assert_eq!(generated.kind, StatementKind::Text);
    }

    #[test]
    fn function_without_text_is_a_stored_procedure() {
        let f = Arc::new(FunctionMeta::store("Restart", int32_type()).with_schema("cimv2"));
        let generated = SqlGenerator::generate(&CommandTree::function(f, None), &GeneratorConfig::default()).unwrap();
        assert_eq!(generated.text, "cimv2.Restart");
        assert_eq!(generated.kind, StatementKind::StoredProcedure);
    }

    #[test]
    fn mutations_carry_parameters() {
        let target = ExpressionBinding::new(Expr::scan(processes()), "t");
        let tree = CommandTree::Delete(DeleteTree {
            predicate: Expr::eq(target.prop("Handle"), Expr::constant(4i64)),
            target,
            returning: vec![],
        });
        let generated = SqlGenerator::generate(&tree, &GeneratorConfig::default()).unwrap();
        assert_eq!(generated.text, "DELETE FROM Win32_Process\nWHERE (Handle = @p0);\n");
        assert_eq!(generated.parameters.len(), 1);
        assert_eq!(generated.parameters[0].value, Some(ConstantValue::Int64(4)));
    }
}
