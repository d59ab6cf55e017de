use indexmap::IndexMap;
use tracing::debug;

use crate::{
    generator::{CompileError, CompileResult, GeneratorConfig, ParameterRecord, QueryCompiler},
    metadata::{EntitySet, PrimitiveKind},
    tree::{
        CommandTree, ComparisonOp, ConstantValue, DeleteTree, Expr, ExpressionBinding, InsertTree, SetClause, UpdateTree,
    },
};

/// Text and synthesized parameters of an INSERT, UPDATE or DELETE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMutation {
    pub text: String,
    pub parameters: Vec<ParameterRecord>,
}

/// Writes one modification statement, plus a follow-up SELECT when members
/// are to be read back. Every constant becomes a parameter `@p<n>`.
pub struct MutationCompiler<'c> {
    config: &'c GeneratorConfig,
    text: String,
    parameters: Vec<ParameterRecord>,
    /// Member (lower-cased) to the index of the last parameter bound to it;
    /// only kept when members are read back.
    member_values: Option<IndexMap<String, usize>>,
}

impl<'c> MutationCompiler<'c> {
    pub fn new(config: &'c GeneratorConfig) -> Self {
        Self { config, text: String::new(), parameters: Vec::new(), member_values: None }
    }

    pub fn compile(mut self, tree: &CommandTree) -> CompileResult<CompiledMutation> {
        match tree {
            CommandTree::Insert(insert) => self.write_insert(insert)?,
            CommandTree::Update(update) => self.write_update(update)?,
            CommandTree::Delete(delete) => self.write_delete(delete)?,
            other => {
                return Err(CompileError::invalid_argument(format!(
                    "a {} tree is not a modification",
                    other.kind_name()
                )));
            }
        }
        debug!(kind = tree.kind_name(), parameters = self.parameters.len(), len = self.text.len(), "mutation compiled");
        Ok(CompiledMutation { text: self.text, parameters: self.parameters })
    }

    fn write_insert(&mut self, tree: &InsertTree) -> CompileResult<()> {
        self.preserve_member_values(!tree.returning.is_empty());
        let set = Self::target_set(&tree.target)?;

        self.text.push_str("INSERT INTO ");
        self.write_target(set)?;
        if tree.set_clauses.is_empty() {
            self.text.push_str(" DEFAULT VALUES;\n");
        } else {
            let columns: Vec<&str> = tree.set_clauses.iter().map(|c| c.property.as_str()).collect();
            self.text.push('(');
            self.text.push_str(&columns.join(", "));
            self.text.push_str(")\n VALUES (");
            let mut separator = "";
            for clause in &tree.set_clauses {
                self.text.push_str(separator);
                self.write_expr(&clause.value)?;
                self.register_member_value(&clause.property, &clause.value);
                separator = ", ";
            }
            self.text.push_str(");\n");
        }

        if !tree.returning.is_empty() {
            self.write_returning(set, &tree.returning, true)?;
        }
        Ok(())
    }

    fn write_update(&mut self, tree: &UpdateTree) -> CompileResult<()> {
        self.preserve_member_values(!tree.returning.is_empty());
        let set = Self::target_set(&tree.target)?;

        self.text.push_str("UPDATE ");
        self.write_target(set)?;
        self.text.push_str("\nSET ");
        if tree.set_clauses.is_empty() {
            // nothing to change; touch the row so generated values are recomputed
            let name = self.create_parameter(Some(ConstantValue::Int32(0)), PrimitiveKind::Int32);
            self.text.push_str(&name);
            self.text.push_str(" = 0");
        } else {
            self.write_set_clauses(&tree.set_clauses)?;
        }
        self.text.push_str("\nWHERE ");
        self.write_expr(&tree.predicate)?;
        self.text.push_str(";\n");

        if !tree.returning.is_empty() {
            self.write_returning(set, &tree.returning, false)?;
        }
        Ok(())
    }

    fn write_delete(&mut self, tree: &DeleteTree) -> CompileResult<()> {
        self.preserve_member_values(!tree.returning.is_empty());
        let set = Self::target_set(&tree.target)?;

        self.text.push_str("DELETE FROM ");
        self.write_target(set)?;
        self.text.push_str("\nWHERE ");
        self.write_expr(&tree.predicate)?;
        self.text.push_str(";\n");

        if !tree.returning.is_empty() {
            self.write_returning(set, &tree.returning, false)?;
        }
        Ok(())
    }

    fn write_set_clauses(&mut self, clauses: &[SetClause]) -> CompileResult<()> {
        let mut separator = "";
        for clause in clauses {
            self.text.push_str(separator);
            self.text.push_str(&clause.property);
            self.text.push_str(" = ");
            self.write_expr(&clause.value)?;
            self.register_member_value(&clause.property, &clause.value);
            separator = ", ";
        }
        Ok(())
    }

    fn preserve_member_values(&mut self, preserve: bool) {
        self.member_values = preserve.then(IndexMap::new);
    }

    fn target_set(target: &ExpressionBinding) -> CompileResult<&EntitySet> {
        match target.expr.as_ref() {
            Expr::Scan(set) => Ok(set),
            other => Err(CompileError::invalid_argument(format!(
                "modification target must be a scan, got {}",
                other.kind_name()
            ))),
        }
    }

    fn write_target(&mut self, set: &EntitySet) -> CompileResult<()> {
        if set.defining_query.is_some() {
            return Err(CompileError::unsupported(format!(
                "modifying '{}', which is defined by a query",
                set.name
            )));
        }
        if set.store_name().is_empty() {
            return Err(CompileError::invalid_argument("modification target has no name"));
        }
        self.text.push_str(&QueryCompiler::target_sql(set));
        Ok(())
    }

    fn write_expr(&mut self, e: &Expr) -> CompileResult<()> {
        match e {
            Expr::And(left, right) => self.write_binary(left, " AND ", right),
            Expr::Or(left, right) => self.write_binary(left, " OR ", right),
            Expr::Comparison { op, left, right } => {
                self.write_binary(left, &format!(" {op} "), right)?;
                if *op == ComparisonOp::Eq {
                    if let Expr::Property { name, .. } = left.as_ref() {
                        self.register_member_value(name, right);
                    }
                }
                Ok(())
            }
            Expr::IsNull(arg) => {
                self.write_expr(arg)?;
                self.text.push_str(" IS NULL");
                Ok(())
            }
            Expr::Not(arg) => {
                self.text.push_str("NOT (");
                self.write_expr(arg)?;
                self.text.push(')');
                Ok(())
            }
            Expr::Constant(value) => {
                let name = self.create_parameter(Some(value.clone()), value.kind());
                self.text.push_str(&name);
                Ok(())
            }
            Expr::Null(_) => {
                self.text.push_str("NULL");
                Ok(())
            }
            Expr::Property { name, .. } => {
                self.text.push_str(name);
                Ok(())
            }
            Expr::Scan(set) => self.write_target(set),
            Expr::NewRecord { fields } => {
                let mut separator = "";
                for (_, field) in fields {
                    self.text.push_str(separator);
                    self.write_expr(field)?;
                    separator = ", ";
                }
                Ok(())
            }
            other => Err(CompileError::unsupported(format!("{} in a modification statement", other.kind_name()))),
        }
    }

    fn write_binary(&mut self, left: &Expr, op: &str, right: &Expr) -> CompileResult<()> {
        self.text.push('(');
        self.write_expr(left)?;
        self.text.push_str(op);
        self.write_expr(right)?;
        self.text.push(')');
        Ok(())
    }

    fn create_parameter(&mut self, value: Option<ConstantValue>, kind: PrimitiveKind) -> String {
        let name = self.config.parameter_name(&format!("p{}", self.parameters.len()));
        self.parameters.push(ParameterRecord { name: name.clone(), value, kind });
        name
    }

    /// Remember the parameter just written for `member`, when it was a constant.
    fn register_member_value(&mut self, member: &str, value: &Expr) {
        let Some(values) = self.member_values.as_mut() else {
            return;
        };
        if matches!(value, Expr::Constant(_)) && !self.parameters.is_empty() {
            values.insert(member.to_ascii_lowercase(), self.parameters.len() - 1);
        }
    }

    fn bound_parameter(&self, member: &str) -> Option<&str> {
        let index = *self.member_values.as_ref()?.get(&member.to_ascii_lowercase())?;
        self.parameters.get(index).map(|p| p.name.as_str())
    }

    /// `SELECT <members> FROM <target> WHERE <row changed> AND <key predicate>;`
    fn write_returning(&mut self, set: &EntitySet, returning: &[String], was_insert: bool) -> CompileResult<()> {
        let keys = set.key_members();
        let last_insert_id = self.config.last_insert_id.as_str();

        let key_predicate: Vec<(String, String)> = match keys.as_slice() {
            [key] if key.ty.primitive_kind() == Some(PrimitiveKind::Int64)
                && (was_insert || self.bound_parameter(&key.name).is_some()) =>
            {
                let value = self.bound_parameter(&key.name).unwrap_or(last_insert_id);
                vec![(key.name.clone(), value.to_string())]
            }
            _ if !keys.is_empty() && keys.iter().all(|k| self.bound_parameter(&k.name).is_some()) => keys
                .iter()
                .filter_map(|k| self.bound_parameter(&k.name).map(|p| (k.name.clone(), p.to_string())))
                .collect(),
            _ if was_insert => vec![(self.config.rowid_column.clone(), last_insert_id.to_string())],
            _ => {
                let member = keys
                    .iter()
                    .find(|k| self.bound_parameter(&k.name).is_none())
                    .map(|k| k.name.clone())
                    .unwrap_or_else(|| "<key>".to_string());
                return Err(CompileError::MissingKeyValue { table: set.store_name().to_string(), member });
            }
        };

        let mut sql = String::from("SELECT ");
        sql.push_str(&returning.join(", "));
        sql.push_str("\nFROM ");
        sql.push_str(&QueryCompiler::target_sql(set));
        sql.push_str("\nWHERE ");
        sql.push_str(&self.config.row_changed_marker);
        for (column, value) in key_predicate {
            sql.push_str(&format!(" AND {column} = {value}"));
        }
        sql.push_str(";\n");
        self.text.push_str(&sql);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::_tests::fixtures::*;

    fn compile(tree: &CommandTree) -> CompileResult<CompiledMutation> {
        MutationCompiler::new(&GeneratorConfig::default()).compile(tree)
    }

    #[test]
    fn update_binds_constants_as_parameters() {
        let target = ExpressionBinding::new(Expr::scan(processes()), "t");
        let tree = CommandTree::Update(UpdateTree {
            predicate: Expr::eq(target.prop("Handle"), Expr::constant(42i64)),
            set_clauses: vec![SetClause::new("Name", Expr::constant("svc")), SetClause::new("Priority", Expr::constant(8i32))],
            returning: vec![],
            target,
        });
        let out = compile(&tree).unwrap();
        assert_eq!(out.text, "UPDATE Win32_Process\nSET Name = @p0, Priority = @p1\nWHERE (Handle = @p2);\n");
        let names: Vec<_> = out.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@p0", "@p1", "@p2"]);
        assert_eq!(out.parameters[2].kind, PrimitiveKind::Int64);
        assert_eq!(out.parameters[0].value, Some(ConstantValue::from("svc")));
    }

    #[test]
    fn update_without_set_clauses_touches_the_row() {
        let target = ExpressionBinding::new(Expr::scan(processes()), "t");
        let tree = CommandTree::Update(UpdateTree {
            predicate: Expr::eq(target.prop("Handle"), Expr::constant(7i64)),
            set_clauses: vec![],
            returning: vec![],
            target,
        });
        let out = compile(&tree).unwrap();
        assert_eq!(out.text, "UPDATE Win32_Process\nSET @p0 = 0\nWHERE (Handle = @p1);\n");
        assert_eq!(out.parameters[0].kind, PrimitiveKind::Int32);
    }

    #[test]
    fn insert_with_and_without_values() {
        let target = ExpressionBinding::new(Expr::scan(disk_drives()), "t");
        let tree = CommandTree::Insert(InsertTree {
            target: target.clone(),
            set_clauses: vec![SetClause::new("SerialNumber", Expr::constant("WD-1")), SetClause::new("Model", Expr::null(string_type()))],
            returning: vec![],
        });
        assert_eq!(compile(&tree).unwrap().text, "INSERT INTO Win32_DiskDrive(SerialNumber, Model)\n VALUES (@p0, NULL);\n");

        let empty = CommandTree::Insert(InsertTree { target, set_clauses: vec![], returning: vec![] });
        assert_eq!(compile(&empty).unwrap().text, "INSERT INTO Win32_DiskDrive DEFAULT VALUES;\n");
    }

    #[test]
    fn delete_renders_predicate_shapes() {
        let target = ExpressionBinding::new(Expr::scan(processes()), "t");
        let predicate = Expr::and(
            Expr::not(Expr::is_null(target.prop("Name"))),
            Expr::compare(ComparisonOp::Gt, target.prop("Priority"), Expr::constant(4i32)),
        );
        let tree = CommandTree::Delete(DeleteTree { target, predicate, returning: vec![] });
        assert_eq!(
            compile(&tree).unwrap().text,
            "DELETE FROM Win32_Process\nWHERE (NOT (Name IS NULL) AND (Priority > @p0));\n"
        );
    }

    #[test]
    fn returning_uses_last_insert_id_for_unbound_integer_key() {
        let target = ExpressionBinding::new(Expr::scan(processes()), "t");
        let tree = CommandTree::Insert(InsertTree {
            target,
            set_clauses: vec![SetClause::new("Name", Expr::constant("svc"))],
            returning: vec!["Handle".into(), "CreationDate".into()],
        });
        let out = compile(&tree).unwrap();
        assert_eq!(
            out.text,
            "INSERT INTO Win32_Process(Name)\n VALUES (@p0);\n\
             SELECT Handle, CreationDate\nFROM Win32_Process\nWHERE changes() > 0 AND Handle = last_insert_rowid();\n"
        );
    }

    #[test]
    fn returning_uses_bound_integer_key() {
        let target = ExpressionBinding::new(Expr::scan(processes()), "t");
        let tree = CommandTree::Update(UpdateTree {
            predicate: Expr::eq(target.prop("Handle"), Expr::constant(9i64)),
            set_clauses: vec![SetClause::new("Priority", Expr::constant(1i32))],
            returning: vec!["CreationDate".into()],
            target,
        });
        let out = compile(&tree).unwrap();
        assert!(out.text.ends_with("WHERE changes() > 0 AND Handle = @p1;\n"), "{}", out.text);
    }

    #[test]
    fn returning_conjoins_all_bound_keys() {
        let target = ExpressionBinding::new(Expr::scan(volumes()), "t");
        let predicate = Expr::and(
            Expr::eq(target.prop("DriveLetter"), Expr::constant("C:")),
            Expr::eq(target.prop("SystemName"), Expr::constant("HOST")),
        );
        let tree = CommandTree::Update(UpdateTree {
            target,
            predicate,
            set_clauses: vec![SetClause::new("Label", Expr::constant("Data"))],
            returning: vec!["FreeSpace".into()],
        });
        let out = compile(&tree).unwrap();
        assert!(
            out.text.ends_with("WHERE changes() > 0 AND DriveLetter = @p1 AND SystemName = @p2;\n"),
            "{}",
            out.text
        );
    }

    #[test]
    fn returning_falls_back_to_rowid_on_insert() {
        let target = ExpressionBinding::new(Expr::scan(volumes()), "t");
        let tree = CommandTree::Insert(InsertTree {
            target,
            set_clauses: vec![SetClause::new("Label", Expr::constant("Data"))],
            returning: vec!["FreeSpace".into()],
        });
        let out = compile(&tree).unwrap();
        assert!(out.text.ends_with("WHERE changes() > 0 AND rowid = last_insert_rowid();\n"), "{}", out.text);
    }

    #[test]
    fn delete_without_key_values_cannot_read_back() {
        let target = ExpressionBinding::new(Expr::scan(disk_drives()), "t");
        let predicate = Expr::compare(ComparisonOp::Gt, target.prop("Size"), Expr::constant(10i64));
        let tree = CommandTree::Delete(DeleteTree { target, predicate, returning: vec!["Model".into()] });
        match compile(&tree) {
            Err(CompileError::MissingKeyValue { table, member }) => {
                assert_eq!(table, "Win32_DiskDrive");
                assert_eq!(member, "SerialNumber");
            }
            other => panic!("expected MissingKeyValue, got {other:?}"),
        }
    }

    #[test]
    fn defining_query_targets_are_rejected() {
        let target = ExpressionBinding::new(Expr::scan(running_services()), "t");
        let tree = CommandTree::Delete(DeleteTree {
            predicate: Expr::eq(target.prop("Name"), Expr::constant("x")),
            target,
            returning: vec![],
        });
        assert!(matches!(compile(&tree), Err(CompileError::UnsupportedConstruct(_))));
    }

    #[test]
    fn unsupported_nodes_and_query_trees_fail() {
        let target = ExpressionBinding::new(Expr::scan(processes()), "t");
        let tree = CommandTree::Delete(DeleteTree {
            predicate: Expr::like(target.prop("Name"), Expr::constant("a%"), None),
            target,
            returning: vec![],
        });
        assert!(matches!(compile(&tree), Err(CompileError::UnsupportedConstruct(_))));
        assert!(matches!(
            compile(&CommandTree::query(Expr::scan(processes()))),
            Err(CompileError::InvalidArgument(_))
        ));
    }
}
