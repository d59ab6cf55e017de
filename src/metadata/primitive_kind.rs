use serde::{Deserialize, Serialize};

/// Scalar kinds a member, constant or parameter can carry.
///
/// The set mirrors the primitive types an entity model exposes to the
/// compiler. Not every kind has a literal form in the target dialect
/// (`DateTimeOffset` and `Time` are rejected when rendered as constants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// Raw bytes
    Binary,
    /// true / false
    Boolean,
    /// Unsigned 8-bit integer
    Byte,
    /// Signed 8-bit integer
    SByte,
    /// Date and time without offset
    DateTime,
    /// Date and time with a UTC offset
    DateTimeOffset,
    /// Time of day
    Time,
    /// Exact decimal number
    Decimal,
    /// 64-bit float
    Double,
    /// 32-bit float
    Single,
    /// 128-bit identifier
    Guid,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Text
    String,
}

impl PrimitiveKind {
    /// Whether values of this kind are whole numbers.
    pub fn is_integer(self) -> bool {
        use PrimitiveKind::*;
        matches!(self, Byte | SByte | Int16 | Int32 | Int64)
    }

    /// Whether values of this kind are numbers of any sort.
    pub fn is_numeric(self) -> bool {
        use PrimitiveKind::*;
        self.is_integer() || matches!(self, Decimal | Double | Single)
    }

    /// Name of the CIM primitive the WMI schema uses for this kind
    /// (`sint32`, `real64`, ...). Kinds without a CIM counterpart return `None`.
    pub fn cim_type_name(self) -> Option<&'static str> {
        use PrimitiveKind::*;
        match self {
            Boolean => Some("boolean"),
            Int16 => Some("sint16"),
            Int32 => Some("sint32"),
            Int64 => Some("sint64"),
            Byte => Some("uint8"),
            Decimal => Some("uint64"),
            Single => Some("real32"),
            Double => Some("real64"),
            String => Some("string"),
            DateTime => Some("datetime"),
            Binary | SByte | DateTimeOffset | Time | Guid => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_kinds() {
        assert!(PrimitiveKind::Int64.is_integer());
        assert!(PrimitiveKind::Byte.is_integer());
        assert!(!PrimitiveKind::Decimal.is_integer());
        assert!(PrimitiveKind::Decimal.is_numeric());
        assert!(!PrimitiveKind::String.is_numeric());
    }

    #[test]
    fn cim_names() {
        assert_eq!(PrimitiveKind::Int32.cim_type_name(), Some("sint32"));
        assert_eq!(PrimitiveKind::Decimal.cim_type_name(), Some("uint64"));
        assert_eq!(PrimitiveKind::Double.cim_type_name(), Some("real64"));
        assert_eq!(PrimitiveKind::Guid.cim_type_name(), None);
    }

    #[test]
    fn deserializes_from_variant_name() {
        let k: PrimitiveKind = serde_json::from_str("\"Int64\"").unwrap();
        assert_eq!(k, PrimitiveKind::Int64);
    }
}
