use std::sync::Arc;

use crate::{
    metadata::{EntitySet, PrimitiveKind, TypeUsage},
    tree::{
        AggregateCall, ApplyKind, ArithmeticOp, ComparisonOp, ConstantValue, ExpressionBinding,
        FunctionCall, FunctionMeta, GroupBinding, JoinKind, QuantifierKind, ReferenceKind,
        SetOpKind, SortKey, TypeTestKind,
    },
};

/// A node of the relational expression tree handed over by the planner.
///
/// Trees are immutable plain data; the compiler only ever borrows them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// All rows of an entity set.
    Scan(Arc<EntitySet>),

    Filter {
        input: ExpressionBinding,
        predicate: Box<Expr>,
    },

    Project {
        input: ExpressionBinding,
        projection: Box<Expr>,
    },

    Join {
        kind: JoinKind,
        left: ExpressionBinding,
        right: ExpressionBinding,
        condition: Box<Expr>,
    },

    CrossJoin {
        inputs: Vec<ExpressionBinding>,
    },

    Apply {
        kind: ApplyKind,
        input: ExpressionBinding,
        apply: ExpressionBinding,
    },

    /// Keys and aggregates are named; the names become the output members.
    GroupBy {
        input: GroupBinding,
        keys: Vec<(String, Expr)>,
        aggregates: Vec<(String, AggregateCall)>,
    },

    Sort {
        input: ExpressionBinding,
        keys: Vec<SortKey>,
    },

    /// Skip always comes with the ordering that makes the offset meaningful.
    Skip {
        input: ExpressionBinding,
        keys: Vec<SortKey>,
        count: Box<Expr>,
    },

    Limit {
        input: Box<Expr>,
        count: Box<Expr>,
        with_ties: bool,
    },

    Distinct(Box<Expr>),

    SetOp {
        kind: SetOpKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// The single element of a collection, used as a scalar.
    Element(Box<Expr>),

    IsEmpty(Box<Expr>),

    Quantifier {
        kind: QuantifierKind,
        input: ExpressionBinding,
        predicate: Box<Expr>,
    },

    /// Collection constructor `{ a, b, ... }`.
    NewCollection {
        element_type: TypeUsage,
        items: Vec<Expr>,
    },

    Constant(ConstantValue),

    Null(TypeUsage),

    Property {
        instance: Box<Expr>,
        name: String,
    },

    VariableRef {
        name: String,
        ty: TypeUsage,
    },

    ParameterRef {
        name: String,
        ty: TypeUsage,
    },

    Function(FunctionCall),

    Case {
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },

    Cast {
        arg: Box<Expr>,
        ty: TypeUsage,
    },

    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Negate(Box<Expr>),

    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    And(Box<Expr>, Box<Expr>),

    Or(Box<Expr>, Box<Expr>),

    Not(Box<Expr>),

    IsNull(Box<Expr>),

    Like {
        arg: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
    },

    /// Row constructor; only valid as a projection.
    NewRecord {
        fields: Vec<(String, Expr)>,
    },

    Navigate {
        source: Box<Expr>,
        relationship: String,
    },

    TypeTest {
        kind: TypeTestKind,
        arg: Box<Expr>,
        ty: TypeUsage,
    },

    Reference {
        kind: ReferenceKind,
        arg: Box<Expr>,
    },

    Lambda {
        body: Box<Expr>,
    },
}

impl Expr {
    // ---------- relational constructors ----------

    pub fn scan(set: Arc<EntitySet>) -> Expr {
        Expr::Scan(set)
    }

    pub fn filter(input: ExpressionBinding, predicate: Expr) -> Expr {
        Expr::Filter { input, predicate: Box::new(predicate) }
    }

    pub fn project(input: ExpressionBinding, projection: Expr) -> Expr {
        Expr::Project { input, projection: Box::new(projection) }
    }

    pub fn join(kind: JoinKind, left: ExpressionBinding, right: ExpressionBinding, condition: Expr) -> Expr {
        Expr::Join { kind, left, right, condition: Box::new(condition) }
    }

    pub fn cross_join(inputs: Vec<ExpressionBinding>) -> Expr {
        Expr::CrossJoin { inputs }
    }

    pub fn group_by(input: GroupBinding, keys: Vec<(&str, Expr)>, aggregates: Vec<(&str, AggregateCall)>) -> Expr {
        Expr::GroupBy {
            input,
            keys: keys.into_iter().map(|(n, e)| (n.to_string(), e)).collect(),
            aggregates: aggregates.into_iter().map(|(n, a)| (n.to_string(), a)).collect(),
        }
    }

    pub fn sort(input: ExpressionBinding, keys: Vec<SortKey>) -> Expr {
        Expr::Sort { input, keys }
    }

    pub fn skip(input: ExpressionBinding, keys: Vec<SortKey>, count: Expr) -> Expr {
        Expr::Skip { input, keys, count: Box::new(count) }
    }

    pub fn limit(input: Expr, count: Expr) -> Expr {
        Expr::Limit { input: Box::new(input), count: Box::new(count), with_ties: false }
    }

    pub fn distinct(input: Expr) -> Expr {
        Expr::Distinct(Box::new(input))
    }

    pub fn set_op(kind: SetOpKind, left: Expr, right: Expr) -> Expr {
        Expr::SetOp { kind, left: Box::new(left), right: Box::new(right) }
    }

    pub fn element(input: Expr) -> Expr {
        Expr::Element(Box::new(input))
    }

    pub fn is_empty(input: Expr) -> Expr {
        Expr::IsEmpty(Box::new(input))
    }

    pub fn any(input: ExpressionBinding, predicate: Expr) -> Expr {
        Expr::Quantifier { kind: QuantifierKind::Any, input, predicate: Box::new(predicate) }
    }

    pub fn all(input: ExpressionBinding, predicate: Expr) -> Expr {
        Expr::Quantifier { kind: QuantifierKind::All, input, predicate: Box::new(predicate) }
    }

    // ---------- scalar constructors ----------

    pub fn constant(value: impl Into<ConstantValue>) -> Expr {
        Expr::Constant(value.into())
    }

    pub fn null(ty: TypeUsage) -> Expr {
        Expr::Null(ty)
    }

    pub fn property(instance: Expr, name: &str) -> Expr {
        Expr::Property { instance: Box::new(instance), name: name.to_string() }
    }

    pub fn var(name: &str, ty: TypeUsage) -> Expr {
        Expr::VariableRef { name: name.to_string(), ty }
    }

    pub fn param(name: &str, ty: TypeUsage) -> Expr {
        Expr::ParameterRef { name: name.to_string(), ty }
    }

    pub fn call(function: Arc<FunctionMeta>, args: Vec<Expr>) -> Expr {
        Expr::Function(FunctionCall { function, args })
    }

    pub fn cast(arg: Expr, ty: TypeUsage) -> Expr {
        Expr::Cast { arg: Box::new(arg), ty }
    }

    pub fn arith(op: ArithmeticOp, left: Expr, right: Expr) -> Expr {
        Expr::Arithmetic { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn compare(op: ComparisonOp, left: Expr, right: Expr) -> Expr {
        Expr::Comparison { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::compare(ComparisonOp::Eq, left, right)
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expr, right: Expr) -> Expr {
        Expr::Or(Box::new(left), Box::new(right))
    }

    pub fn not(arg: Expr) -> Expr {
        Expr::Not(Box::new(arg))
    }

    pub fn is_null(arg: Expr) -> Expr {
        Expr::IsNull(Box::new(arg))
    }

    pub fn like(arg: Expr, pattern: Expr, escape: Option<Expr>) -> Expr {
        Expr::Like { arg: Box::new(arg), pattern: Box::new(pattern), escape: escape.map(Box::new) }
    }

    pub fn record(fields: Vec<(&str, Expr)>) -> Expr {
        Expr::NewRecord { fields: fields.into_iter().map(|(n, e)| (n.to_string(), e)).collect() }
    }

    // ---------- shape tests ----------

    pub fn is_scan(&self) -> bool {
        matches!(self, Expr::Scan(_))
    }

    pub fn is_join(&self) -> bool {
        matches!(self, Expr::Join { .. } | Expr::CrossJoin { .. })
    }

    pub fn is_apply(&self) -> bool {
        matches!(self, Expr::Apply { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Expr::Function(_))
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, Expr::Null(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Scan(_) => "Scan",
            Expr::Filter { .. } => "Filter",
            Expr::Project { .. } => "Project",
            Expr::Join { .. } => "Join",
            Expr::CrossJoin { .. } => "CrossJoin",
            Expr::Apply { .. } => "Apply",
            Expr::GroupBy { .. } => "GroupBy",
            Expr::Sort { .. } => "Sort",
            Expr::Skip { .. } => "Skip",
            Expr::Limit { .. } => "Limit",
            Expr::Distinct(_) => "Distinct",
            Expr::SetOp { .. } => "SetOp",
            Expr::Element(_) => "Element",
            Expr::IsEmpty(_) => "IsEmpty",
            Expr::Quantifier { .. } => "Quantifier",
            Expr::NewCollection { .. } => "NewCollection",
            Expr::Constant(_) => "Constant",
            Expr::Null(_) => "Null",
            Expr::Property { .. } => "Property",
            Expr::VariableRef { .. } => "VariableRef",
            Expr::ParameterRef { .. } => "ParameterRef",
            Expr::Function(_) => "Function",
            Expr::Case { .. } => "Case",
            Expr::Cast { .. } => "Cast",
            Expr::Arithmetic { .. } => "Arithmetic",
            Expr::Negate(_) => "Negate",
            Expr::Comparison { .. } => "Comparison",
            Expr::And(..) => "And",
            Expr::Or(..) => "Or",
            Expr::Not(_) => "Not",
            Expr::IsNull(_) => "IsNull",
            Expr::Like { .. } => "Like",
            Expr::NewRecord { .. } => "NewRecord",
            Expr::Navigate { .. } => "Navigate",
            Expr::TypeTest { .. } => "TypeTest",
            Expr::Reference { .. } => "Reference",
            Expr::Lambda { .. } => "Lambda",
        }
    }

    /// Type of the value this node produces.
    pub fn result_type(&self) -> TypeUsage {
        let boolean = || TypeUsage::primitive(PrimitiveKind::Boolean);
        match self {
            Expr::Scan(set) => TypeUsage::collection_of(set.element_type()),
            Expr::Filter { input, .. } | Expr::Sort { input, .. } | Expr::Skip { input, .. } => {
                input.expr.result_type()
            }
            Expr::Limit { input, .. } | Expr::Distinct(input) => input.result_type(),
            Expr::Project { projection, .. } => TypeUsage::collection_of(projection.result_type()),
            Expr::Join { left, right, .. } => TypeUsage::collection_of(TypeUsage::row([
                (left.var_name.as_str(), left.var_type.clone()),
                (right.var_name.as_str(), right.var_type.clone()),
            ])),
            Expr::CrossJoin { inputs } => TypeUsage::collection_of(TypeUsage::row(
                inputs.iter().map(|b| (b.var_name.as_str(), b.var_type.clone())),
            )),
            Expr::Apply { input, apply, .. } => TypeUsage::collection_of(TypeUsage::row([
                (input.var_name.as_str(), input.var_type.clone()),
                (apply.var_name.as_str(), apply.var_type.clone()),
            ])),
            Expr::GroupBy { keys, aggregates, .. } => {
                let members = keys
                    .iter()
                    .map(|(n, e)| (n.as_str(), e.result_type()))
                    .chain(aggregates.iter().map(|(n, a)| (n.as_str(), a.function.return_type.clone())));
                TypeUsage::collection_of(TypeUsage::row(members))
            }
            Expr::SetOp { left, .. } => left.result_type(),
            Expr::Element(arg) => arg.result_type().element_type().clone(),
            Expr::NewCollection { element_type, .. } => TypeUsage::collection_of(element_type.clone()),
            Expr::IsEmpty(_)
            | Expr::Quantifier { .. }
            | Expr::Comparison { .. }
            | Expr::And(..)
            | Expr::Or(..)
            | Expr::Not(_)
            | Expr::IsNull(_)
            | Expr::Like { .. } => boolean(),
            Expr::Constant(value) => TypeUsage::primitive(value.kind()),
            Expr::Null(ty) | Expr::VariableRef { ty, .. } | Expr::ParameterRef { ty, .. } | Expr::Cast { ty, .. } => {
                ty.clone()
            }
            // members missing from the instance type are opaque scalars
            Expr::Property { instance, name } => instance
                .result_type()
                .member(name)
                .map(|m| m.ty.clone())
                .unwrap_or_else(|| TypeUsage::primitive(PrimitiveKind::String)),
            Expr::Function(call) => call.function.return_type.clone(),
            Expr::Case { branches, otherwise } => branches
                .first()
                .map(|(_, then)| then.result_type())
                .or_else(|| otherwise.as_ref().map(|e| e.result_type()))
                .unwrap_or_else(boolean),
            Expr::Arithmetic { left, .. } => left.result_type(),
            Expr::Negate(arg) => arg.result_type(),
            Expr::NewRecord { fields } => {
                TypeUsage::row(fields.iter().map(|(n, e)| (n.as_str(), e.result_type())))
            }
            Expr::TypeTest { kind, ty, .. } => match kind {
                TypeTestKind::IsOf | TypeTestKind::IsOfOnly => boolean(),
                TypeTestKind::OfType | TypeTestKind::OfTypeOnly => TypeUsage::collection_of(ty.clone()),
                TypeTestKind::Treat => ty.clone(),
            },
            Expr::Navigate { .. } | Expr::Reference { .. } | Expr::Lambda { .. } => {
                TypeUsage::Row(Default::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Member, RowType};

    fn processes() -> Arc<EntitySet> {
        Arc::new(EntitySet::new(
            "Win32_Process",
            RowType::new(vec![
                Member::new("ProcessId", TypeUsage::primitive(PrimitiveKind::Int64)),
                Member::new("Name", TypeUsage::primitive(PrimitiveKind::String)),
            ]),
        ))
    }

    #[test]
    fn binding_takes_element_type_of_input() {
        let b = ExpressionBinding::new(Expr::scan(processes()), "p");
        assert!(b.var_type.is_row());
        assert_eq!(b.prop("Name").result_type(), TypeUsage::primitive(PrimitiveKind::String));
    }

    #[test]
    fn relational_nodes_keep_collection_types() {
        let b = ExpressionBinding::new(Expr::scan(processes()), "p");
        let filtered = Expr::filter(b.clone(), Expr::is_null(b.prop("Name")));
        assert!(filtered.result_type().is_collection());

        let projected = Expr::project(
            ExpressionBinding::new(filtered, "f"),
            Expr::record(vec![("Id", Expr::property(Expr::var("f", b.var_type.clone()), "ProcessId"))]),
        );
        let element = projected.result_type();
        assert_eq!(element.element_type().properties()[0].name, "Id");
        assert_eq!(
            element.element_type().properties()[0].ty,
            TypeUsage::primitive(PrimitiveKind::Int64)
        );
    }

    #[test]
    fn join_rows_are_named_after_variables() {
        let l = ExpressionBinding::new(Expr::scan(processes()), "a");
        let r = ExpressionBinding::new(Expr::scan(processes()), "b");
        let j = Expr::join(JoinKind::Inner, l.clone(), r.clone(), Expr::eq(l.prop("ProcessId"), r.prop("ProcessId")));
        let names: Vec<_> = j.result_type().element_type().properties().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(j.is_join());
    }

    #[test]
    fn element_unwraps_collection() {
        let scan = Expr::scan(processes());
        assert!(Expr::element(scan).result_type().is_row());
        assert_eq!(Expr::is_empty(Expr::scan(processes())).result_type(), TypeUsage::primitive(PrimitiveKind::Boolean));
    }
}
