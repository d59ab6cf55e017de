use std::fmt;

use crate::{
    generator::{CompileError, CompileResult},
    metadata::{Facets, PrimitiveKind, TypeUsage},
};

/// A store-side type: a store type name plus the facets that survive the mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreType {
    pub name: String,
    pub facets: Facets,
}

impl StoreType {
    pub fn new(name: &str, facets: Facets) -> Self {
        Self { name: name.to_string(), facets }
    }

    fn plain(name: &str) -> Self {
        Self::new(name, Facets::default())
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name.as_str(), self.facets.precision, self.facets.max_length) {
            ("decimal", Some(p), _) => write!(f, "decimal({},{})", p, self.facets.scale.unwrap_or(0)),
            (name, _, Some(len)) => write!(f, "{name}({len})"),
            (name, _, _) => write!(f, "{name}"),
        }
    }
}

/// Maps model primitive types to store types and back.
pub struct ProviderManifest;

impl ProviderManifest {
    /// Store type used to persist values of a model type.
    pub fn store_type(ty: &TypeUsage) -> CompileResult<StoreType> {
        let TypeUsage::Primitive { kind, facets } = ty else {
            return Err(CompileError::unsupported(format!("no store type for non-primitive type {ty:?}")));
        };

        let store = match kind {
            PrimitiveKind::Boolean => StoreType::plain("bit"),
            PrimitiveKind::Byte => StoreType::plain("tinyint"),
            PrimitiveKind::Int16 => StoreType::plain("smallint"),
            PrimitiveKind::Int32 => StoreType::plain("int"),
            PrimitiveKind::Int64 => StoreType::plain("integer"),
            PrimitiveKind::Guid => StoreType::plain("uniqueidentifier"),
            PrimitiveKind::Double => StoreType::plain("float"),
            PrimitiveKind::Single => StoreType::plain("real"),
            PrimitiveKind::DateTime => StoreType::plain("datetime"),
            PrimitiveKind::Decimal => StoreType::new(
                "decimal",
                Facets::new().decimal(facets.precision_or_default(), facets.scale.unwrap_or(0)),
            ),
            PrimitiveKind::Binary => {
                let mut out = Facets::new().fixed_length(facets.is_fixed_length());
                out.max_length = facets.max_length;
                StoreType::new("blob", out)
            }
            PrimitiveKind::String => {
                let name = match (facets.is_unicode(), facets.is_fixed_length()) {
                    (true, true) => "nchar",
                    (true, false) => "nvarchar",
                    (false, true) => "char",
                    (false, false) => "varchar",
                };
                let mut out = Facets::new()
                    .unicode(facets.is_unicode())
                    .fixed_length(facets.is_fixed_length());
                out.max_length = facets.max_length;
                StoreType::new(name, out)
            }
            PrimitiveKind::SByte | PrimitiveKind::DateTimeOffset | PrimitiveKind::Time => {
                return Err(CompileError::unsupported(format!("no store type corresponding to {kind:?}")));
            }
        };
        Ok(store)
    }

    /// Model type for a store type reported by the schema.
    pub fn edm_type(store: &StoreType) -> CompileResult<TypeUsage> {
        let name = store.name.to_ascii_lowercase();
        let kind = match name.as_str() {
            "tinyint" => PrimitiveKind::Byte,
            "smallint" => PrimitiveKind::Int16,
            "int" => PrimitiveKind::Int32,
            "integer" => PrimitiveKind::Int64,
            "bit" => PrimitiveKind::Boolean,
            "uniqueidentifier" => PrimitiveKind::Guid,
            "float" => PrimitiveKind::Double,
            "real" => PrimitiveKind::Single,
            "datetime" => PrimitiveKind::DateTime,
            "decimal" => {
                let facets = match (store.facets.precision, store.facets.scale) {
                    (Some(p), Some(s)) => Facets::new().decimal(p, s),
                    _ => Facets::new(),
                };
                return Ok(TypeUsage::with_facets(PrimitiveKind::Decimal, facets));
            }
            "varchar" | "char" | "nvarchar" | "nchar" => {
                let mut facets = Facets::new()
                    .unicode(name.starts_with('n'))
                    .fixed_length(name.ends_with("char") && !name.ends_with("varchar"));
                facets.max_length = store.facets.max_length;
                return Ok(TypeUsage::with_facets(PrimitiveKind::String, facets));
            }
            "blob" => {
                let mut facets = Facets::new().fixed_length(false);
                facets.max_length = store.facets.max_length;
                return Ok(TypeUsage::with_facets(PrimitiveKind::Binary, facets));
            }
            other => return Err(CompileError::unsupported(format!("store type '{other}'"))),
        };
        Ok(TypeUsage::primitive(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(facets: Facets) -> TypeUsage {
        TypeUsage::with_facets(PrimitiveKind::String, facets)
    }

    #[test]
    fn integers_map_to_fixed_store_names() {
        let name = |k| ProviderManifest::store_type(&TypeUsage::primitive(k)).unwrap().name;
        assert_eq!(name(PrimitiveKind::Int64), "integer");
        assert_eq!(name(PrimitiveKind::Int32), "int");
        assert_eq!(name(PrimitiveKind::Boolean), "bit");
        assert_eq!(name(PrimitiveKind::Guid), "uniqueidentifier");
    }

    #[test]
    fn strings_pick_variant_from_facets() {
        let st = ProviderManifest::store_type(&string(Facets::new())).unwrap();
        assert_eq!(st.name, "nvarchar");
        let st = ProviderManifest::store_type(&string(Facets::new().unicode(false).fixed_length(true).max_length(8))).unwrap();
        assert_eq!(st.to_string(), "char(8)");
    }

    #[test]
    fn decimal_defaults_precision() {
        let st = ProviderManifest::store_type(&TypeUsage::primitive(PrimitiveKind::Decimal)).unwrap();
        assert_eq!(st.to_string(), "decimal(18,0)");
    }

    #[test]
    fn offsets_have_no_store_type() {
        let err = ProviderManifest::store_type(&TypeUsage::primitive(PrimitiveKind::DateTimeOffset));
        assert!(matches!(err, Err(CompileError::UnsupportedConstruct(_))));
    }

    #[test]
    fn edm_type_inverts_store_names() {
        let t = ProviderManifest::edm_type(&StoreType::new("VARCHAR", Facets::new().max_length(10))).unwrap();
        let facets = t.facets().unwrap();
        assert_eq!(t.primitive_kind(), Some(PrimitiveKind::String));
        assert!(!facets.is_unicode());
        assert!(!facets.is_fixed_length());
        assert_eq!(facets.max_length, Some(10));

        let t = ProviderManifest::edm_type(&StoreType::new("nchar", Facets::new())).unwrap();
        assert!(t.facets().unwrap().is_fixed_length());

        assert_eq!(
            ProviderManifest::edm_type(&StoreType::new("integer", Facets::new())).unwrap(),
            TypeUsage::primitive(PrimitiveKind::Int64)
        );
        assert!(ProviderManifest::edm_type(&StoreType::new("xml", Facets::new())).is_err());
    }
}
