use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::{
    generator::{CompileError, CompileResult, ParameterRecord},
    metadata::{PrimitiveKind, ProviderManifest, TypeUsage},
    tree::{ConstantValue, ParameterMode},
};

static PARAMETER_NAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^@?[A-Za-z_][A-Za-z0-9_]*$").ok());

/// Client-side type a parameter value is marshalled as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DbType {
    AnsiString,
    AnsiStringFixedLength,
    String,
    StringFixedLength,
    Binary,
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    Decimal,
    Double,
    Single,
    DateTime,
    DateTimeOffset,
    Time,
    Guid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParameterDirection {
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl From<ParameterMode> for ParameterDirection {
    fn from(mode: ParameterMode) -> Self {
        match mode {
            ParameterMode::In => ParameterDirection::Input,
            ParameterMode::Out => ParameterDirection::Output,
            ParameterMode::InOut => ParameterDirection::InputOutput,
            ParameterMode::ReturnValue => ParameterDirection::ReturnValue,
        }
    }
}

impl ParameterDirection {
    pub fn is_output(self) -> bool {
        !matches!(self, ParameterDirection::Input)
    }
}

/// A typed parameter of a [`Command`](crate::command::Command).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub db_type: DbType,
    pub direction: ParameterDirection,
    pub size: Option<i32>,
    pub nullable: bool,
    /// Store type the value maps to, when the provider has one for it.
    pub store_type: Option<String>,
    pub value: Option<ConstantValue>,
}

impl Parameter {
    pub fn is_valid_name(name: &str) -> bool {
        PARAMETER_NAME.as_ref().map(|re| re.is_match(name)).unwrap_or(false)
    }

    /// Declared parameter of type `ty`; the value is left unset.
    pub fn from_type(name: &str, ty: &TypeUsage, mode: ParameterMode) -> CompileResult<Self> {
        if !Self::is_valid_name(name) {
            return Err(CompileError::invalid_argument(format!("invalid parameter name '{name}'")));
        }
        let TypeUsage::Primitive { kind, facets } = ty else {
            return Err(CompileError::invalid_argument(format!("parameter '{name}' is not of a primitive type")));
        };

        let direction = ParameterDirection::from(mode);
        let db_type = Self::db_type(*kind, facets.is_unicode(), facets.is_fixed_length());
        let size = match (kind, facets.max_length) {
            (PrimitiveKind::Guid, _) => Some(GUID_TEXT_LENGTH),
            (PrimitiveKind::String | PrimitiveKind::Binary, Some(len)) => Some(i32::try_from(len).unwrap_or(i32::MAX)),
            (PrimitiveKind::String | PrimitiveKind::Binary, None) if direction.is_output() => Some(i32::MAX),
            _ => None,
        };

        Ok(Self {
            name: name.to_string(),
            db_type,
            direction,
            size,
            nullable: facets.is_nullable(),
            store_type: ProviderManifest::store_type(ty).ok().map(|st| st.to_string()),
            value: None,
        })
    }

    /// Input parameter for a value the compiler pulled out of the tree.
    pub fn from_record(record: &ParameterRecord) -> CompileResult<Self> {
        let mut parameter = Self::from_type(&record.name, &TypeUsage::primitive(record.kind), ParameterMode::In)?;
        parameter.nullable = record.value.is_none();
        parameter.value = record.value.clone();
        Ok(parameter)
    }

    /// Guids travel as their fixed-length ANSI text form.
    fn db_type(kind: PrimitiveKind, unicode: bool, fixed_length: bool) -> DbType {
        match kind {
            PrimitiveKind::String => match (unicode, fixed_length) {
                (true, true) => DbType::StringFixedLength,
                (true, false) => DbType::String,
                (false, true) => DbType::AnsiStringFixedLength,
                (false, false) => DbType::AnsiString,
            },
            PrimitiveKind::Guid => DbType::AnsiStringFixedLength,
            PrimitiveKind::Binary => DbType::Binary,
            PrimitiveKind::Boolean => DbType::Boolean,
            PrimitiveKind::Byte => DbType::Byte,
            PrimitiveKind::SByte => DbType::SByte,
            PrimitiveKind::Int16 => DbType::Int16,
            PrimitiveKind::Int32 => DbType::Int32,
            PrimitiveKind::Int64 => DbType::Int64,
            PrimitiveKind::Decimal => DbType::Decimal,
            PrimitiveKind::Double => DbType::Double,
            PrimitiveKind::Single => DbType::Single,
            PrimitiveKind::DateTime => DbType::DateTime,
            PrimitiveKind::DateTimeOffset => DbType::DateTimeOffset,
            PrimitiveKind::Time => DbType::Time,
        }
    }
}

/// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`
const GUID_TEXT_LENGTH: i32 = 36;
