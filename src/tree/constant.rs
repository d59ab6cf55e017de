use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime};
use ordered_float::NotNan;
use serde::Serialize;
use uuid::Uuid;

use crate::metadata::PrimitiveKind;

/// Exact decimal as an integer mantissa and a base-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DecimalValue {
    pub mantissa: i128,
    pub scale: u32,
}

impl DecimalValue {
    pub fn new(mantissa: i128, scale: u32) -> Self {
        Self { mantissa, scale }
    }

    /// Parse invariant text such as `-12.50`. Exponents are not accepted.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }
        let joined = format!("{int_part}{frac_part}");
        let magnitude: i128 = if joined.is_empty() { 0 } else { joined.parse().ok()? };
        let mantissa = if negative { -magnitude } else { magnitude };
        Some(Self::new(mantissa, frac_part.len() as u32))
    }
}

impl From<i64> for DecimalValue {
    fn from(v: i64) -> Self {
        Self::new(v as i128, 0)
    }
}

impl fmt::Display for DecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

/// Value of a constant node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ConstantValue {
    Binary(Vec<u8>),
    Boolean(bool),
    Byte(u8),
    SByte(i8),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Time(NaiveTime),
    Decimal(DecimalValue),
    Double(NotNan<f64>),
    Single(NotNan<f32>),
    Guid(Uuid),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    String(String),
}

impl ConstantValue {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            ConstantValue::Binary(_) => PrimitiveKind::Binary,
            ConstantValue::Boolean(_) => PrimitiveKind::Boolean,
            ConstantValue::Byte(_) => PrimitiveKind::Byte,
            ConstantValue::SByte(_) => PrimitiveKind::SByte,
            ConstantValue::DateTime(_) => PrimitiveKind::DateTime,
            ConstantValue::DateTimeOffset(_) => PrimitiveKind::DateTimeOffset,
            ConstantValue::Time(_) => PrimitiveKind::Time,
            ConstantValue::Decimal(_) => PrimitiveKind::Decimal,
            ConstantValue::Double(_) => PrimitiveKind::Double,
            ConstantValue::Single(_) => PrimitiveKind::Single,
            ConstantValue::Guid(_) => PrimitiveKind::Guid,
            ConstantValue::Int16(_) => PrimitiveKind::Int16,
            ConstantValue::Int32(_) => PrimitiveKind::Int32,
            ConstantValue::Int64(_) => PrimitiveKind::Int64,
            ConstantValue::String(_) => PrimitiveKind::String,
        }
    }
}

impl From<bool> for ConstantValue {
    fn from(v: bool) -> Self {
        ConstantValue::Boolean(v)
    }
}

impl From<u8> for ConstantValue {
    fn from(v: u8) -> Self {
        ConstantValue::Byte(v)
    }
}

impl From<i16> for ConstantValue {
    fn from(v: i16) -> Self {
        ConstantValue::Int16(v)
    }
}

impl From<i32> for ConstantValue {
    fn from(v: i32) -> Self {
        ConstantValue::Int32(v)
    }
}

impl From<i64> for ConstantValue {
    fn from(v: i64) -> Self {
        ConstantValue::Int64(v)
    }
}

impl From<NotNan<f64>> for ConstantValue {
    fn from(v: NotNan<f64>) -> Self {
        ConstantValue::Double(v)
    }
}

impl From<NotNan<f32>> for ConstantValue {
    fn from(v: NotNan<f32>) -> Self {
        ConstantValue::Single(v)
    }
}

impl From<DecimalValue> for ConstantValue {
    fn from(v: DecimalValue) -> Self {
        ConstantValue::Decimal(v)
    }
}

impl From<&str> for ConstantValue {
    fn from(v: &str) -> Self {
        ConstantValue::String(v.to_string())
    }
}

impl From<String> for ConstantValue {
    fn from(v: String) -> Self {
        ConstantValue::String(v)
    }
}

impl From<Vec<u8>> for ConstantValue {
    fn from(v: Vec<u8>) -> Self {
        ConstantValue::Binary(v)
    }
}

impl From<Uuid> for ConstantValue {
    fn from(v: Uuid) -> Self {
        ConstantValue::Guid(v)
    }
}

impl From<NaiveDateTime> for ConstantValue {
    fn from(v: NaiveDateTime) -> Self {
        ConstantValue::DateTime(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_display_keeps_scale() {
        assert_eq!(DecimalValue::new(12345, 2).to_string(), "123.45");
        assert_eq!(DecimalValue::new(-5, 1).to_string(), "-0.5");
        assert_eq!(DecimalValue::new(7, 3).to_string(), "0.007");
        assert_eq!(DecimalValue::new(100, 0).to_string(), "100");
        assert_eq!(DecimalValue::new(150, 2).to_string(), "1.50");
    }

    #[test]
    fn decimal_parse_round_trips_text() {
        for text in ["0.25", "-12.50", "42", "0.007"] {
            assert_eq!(DecimalValue::parse(text).unwrap().to_string(), text);
        }
        assert!(DecimalValue::parse("1e5").is_none());
        assert!(DecimalValue::parse("").is_none());
        assert!(DecimalValue::parse(".").is_none());
    }

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(ConstantValue::from(3i64).kind(), PrimitiveKind::Int64);
        assert_eq!(ConstantValue::from("x").kind(), PrimitiveKind::String);
        assert_eq!(ConstantValue::from(Uuid::nil()).kind(), PrimitiveKind::Guid);
    }
}
