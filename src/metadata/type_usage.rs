use crate::metadata::{Facets, PrimitiveKind};

/// A named member of a row type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    pub name: String,
    pub ty: TypeUsage,
}

impl Member {
    pub fn new(name: &str, ty: TypeUsage) -> Self {
        Self { name: name.to_string(), ty }
    }
}

/// Ordered list of members. Lookups ignore ASCII case, like the store does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RowType {
    pub members: Vec<Member>,
}

impl RowType {
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The type of an expression, variable, member or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeUsage {
    Primitive { kind: PrimitiveKind, facets: Facets },
    Row(RowType),
    Collection(Box<TypeUsage>),
}

impl TypeUsage {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        TypeUsage::Primitive { kind, facets: Facets::default() }
    }

    pub fn with_facets(kind: PrimitiveKind, facets: Facets) -> Self {
        TypeUsage::Primitive { kind, facets }
    }

    pub fn row<S: AsRef<str>>(members: impl IntoIterator<Item = (S, TypeUsage)>) -> Self {
        TypeUsage::Row(RowType::new(
            members.into_iter().map(|(n, t)| Member::new(n.as_ref(), t)).collect(),
        ))
    }

    pub fn collection_of(element: TypeUsage) -> Self {
        TypeUsage::Collection(Box::new(element))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, TypeUsage::Collection(_))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeUsage::Primitive { .. })
    }

    pub fn is_row(&self) -> bool {
        matches!(self, TypeUsage::Row(_))
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            TypeUsage::Primitive { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn facets(&self) -> Option<&Facets> {
        match self {
            TypeUsage::Primitive { facets, .. } => Some(facets),
            _ => None,
        }
    }

    /// Element type of a collection; any other type is its own element type.
    pub fn element_type(&self) -> &TypeUsage {
        match self {
            TypeUsage::Collection(inner) => inner,
            other => other,
        }
    }

    /// Members of a row type, empty for everything else.
    pub fn properties(&self) -> &[Member] {
        match self {
            TypeUsage::Row(row) => &row.members,
            _ => &[],
        }
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        match self {
            TypeUsage::Row(row) => row.member(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_row() -> TypeUsage {
        TypeUsage::row([
            ("ProcessId", TypeUsage::primitive(PrimitiveKind::Int64)),
            ("Name", TypeUsage::primitive(PrimitiveKind::String)),
        ])
    }

    #[test]
    fn member_lookup_ignores_case() {
        let row = process_row();
        assert_eq!(row.member("processid").map(|m| m.name.as_str()), Some("ProcessId"));
        assert!(row.member("Missing").is_none());
    }

    #[test]
    fn element_type_unwraps_collections_only() {
        let coll = TypeUsage::collection_of(process_row());
        assert!(coll.is_collection());
        assert!(coll.element_type().is_row());
        assert_eq!(coll.element_type().properties().len(), 2);

        let scalar = TypeUsage::primitive(PrimitiveKind::Int32);
        assert_eq!(scalar.element_type(), &scalar);
        assert!(scalar.properties().is_empty());
    }
}
