use serde::Serialize;
use tracing::debug;

use crate::{
    command::Parameter,
    generator::{CompileError, CompileResult, GeneratorConfig, SqlGenerator, StatementKind},
    tree::{CommandTree, ParameterMode},
};

/// Executable form of a command tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub text: String,
    pub kind: StatementKind,
    pub columns: Vec<String>,
    pub parameters: Vec<Parameter>,
}

pub struct CommandBuilder;

impl CommandBuilder {
    /// Generate the text of `tree` and marshal its parameters: declared ones
    /// first, in declaration order, then those the compiler synthesized.
    pub fn create_command(tree: &CommandTree, config: &GeneratorConfig) -> CompileResult<Command> {
        let generated = SqlGenerator::generate(tree, config)?;

        let mut parameters = Vec::new();
        if let Some(declared) = tree.parameters() {
            let function = match tree {
                CommandTree::Function { function, .. } => Some(function),
                _ => None,
            };
            for (name, ty) in declared {
                let parameter = match function.and_then(|f| f.parameter(name)) {
                    Some(meta) => Parameter::from_type(&config.parameter_name(name), &meta.ty, meta.mode)?,
                    None => Parameter::from_type(&config.parameter_name(name), ty, ParameterMode::In)?,
                };
                parameters.push(parameter);
            }
        }

        if !generated.parameters.is_empty() {
            if !tree.is_mutation() {
                return Err(CompileError::invalid_argument(format!(
                    "a {} tree cannot carry compiler parameters",
                    tree.kind_name()
                )));
            }
            for record in &generated.parameters {
                parameters.push(Parameter::from_record(record)?);
            }
        }

        debug!(
            tree = tree.kind_name(),
            kind = ?generated.kind,
            parameters = parameters.len(),
            len = generated.text.len(),
            "command created"
        );
        Ok(Command { text: generated.text, kind: generated.kind, columns: generated.columns, parameters })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        command::{DbType, ParameterDirection},
        generator::_tests::fixtures::*,
        tree::{Expr, ExpressionBinding, FunctionMeta, FunctionParameter, InsertTree, SetClause},
    };

    #[test]
    fn query_parameters_are_declared_inputs() {
        let p = ExpressionBinding::new(Expr::scan(processes()), "p");
        let filtered = Expr::filter(p.clone(), Expr::eq(p.prop("Name"), Expr::param("Name", string_type())));
        let tree = CommandTree::query(filtered).with_parameter("Name", string_type());

        let command = CommandBuilder::create_command(&tree, &GeneratorConfig::default()).unwrap();
        assert!(command.text.ends_with("WHERE p.Name = @Name"), "{}", command.text);
        assert_eq!(command.kind, StatementKind::Text);
        assert_eq!(command.columns.len(), 6);
        assert_eq!(command.parameters.len(), 1);
        assert_eq!(command.parameters[0].name, "@Name");
        assert_eq!(command.parameters[0].direction, ParameterDirection::Input);
        assert_eq!(command.parameters[0].value, None);
    }

    #[test]
    fn function_metadata_wins_over_declared_type() {
        let f = Arc::new(
            FunctionMeta::store("GetOwner", int32_type())
                .with_schema("cimv2")
                .with_parameter(FunctionParameter::new("User", string_type(), ParameterMode::Out)),
        );
        let tree = CommandTree::function(f, None)
            .with_parameter("User", int32_type())
            .with_parameter("Domain", string_type());

        let command = CommandBuilder::create_command(&tree, &GeneratorConfig::default()).unwrap();
        assert_eq!(command.text, "cimv2.GetOwner");
        assert_eq!(command.kind, StatementKind::StoredProcedure);

        let user = &command.parameters[0];
        assert_eq!(user.name, "@User");
        assert_eq!(user.db_type, DbType::String);
        assert_eq!(user.direction, ParameterDirection::Output);
        assert_eq!(user.size, Some(i32::MAX));

        let domain = &command.parameters[1];
        assert_eq!(domain.direction, ParameterDirection::Input);
        assert_eq!(domain.size, None);
    }

    #[test]
    fn mutation_parameters_follow_declared_ones() {
        let target = ExpressionBinding::new(Expr::scan(disk_drives()), "t");
        let tree = CommandTree::Insert(InsertTree {
            target,
            set_clauses: vec![SetClause::new("SerialNumber", Expr::constant("WD-1")), SetClause::new("Size", Expr::constant(512i64))],
            returning: vec![],
        });
        let command = CommandBuilder::create_command(&tree, &GeneratorConfig::default()).unwrap();
        let names: Vec<_> = command.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@p0", "@p1"]);
        assert_eq!(command.parameters[0].db_type, DbType::String);
        assert_eq!(command.parameters[1].db_type, DbType::Int64);
        assert!(command.columns.is_empty());
    }

    #[test]
    fn invalid_declared_name_fails() {
        let tree = CommandTree::query(Expr::constant(1i32)).with_parameter("bad name", int32_type());
        assert!(matches!(
            CommandBuilder::create_command(&tree, &GeneratorConfig::default()),
            Err(CompileError::InvalidArgument(_))
        ));
    }

    #[test]
    fn compile_errors_pass_through() {
        let tree = CommandTree::query(Expr::Lambda { body: Box::new(Expr::constant(1i32)) });
        assert!(matches!(
            CommandBuilder::create_command(&tree, &GeneratorConfig::default()),
            Err(CompileError::UnsupportedConstruct(_))
        ));
    }

    #[test]
    fn commands_serialize() {
        let tree = CommandTree::query(Expr::constant(1i32)).with_parameter("n", int32_type());
        let command = CommandBuilder::create_command(&tree, &GeneratorConfig::default()).unwrap();
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["text"], "SELECT 1");
        assert_eq!(json["kind"], "Text");
        assert_eq!(json["parameters"][0]["db_type"], "Int32");
    }
}
