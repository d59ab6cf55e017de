use crate::{
    generator::{CompileError, CompileResult},
    metadata::Facets,
    tree::{ConstantValue, DecimalValue},
};

/// Text of a constant in the target dialect.
pub fn render_literal(value: &ConstantValue) -> CompileResult<String> {
    let text = match value {
        ConstantValue::Boolean(b) => (if *b { "1" } else { "0" }).to_string(),
        ConstantValue::Byte(v) => v.to_string(),
        ConstantValue::SByte(v) => v.to_string(),
        ConstantValue::Int16(v) => v.to_string(),
        ConstantValue::Int32(v) => v.to_string(),
        ConstantValue::Int64(v) => v.to_string(),
        ConstantValue::String(s) => quote_string(s),
        ConstantValue::Binary(bytes) => hex_literal(bytes),
        ConstantValue::Guid(guid) => hex_literal(&guid.to_bytes_le()),
        ConstantValue::DateTime(dt) => format!("'{}+000'", dt.format("%Y%m%d%H%M%S%.6f")),
        ConstantValue::Decimal(d) => decimal_literal(d),
        ConstantValue::Double(v) => {
            let v = v.into_inner();
            if !v.is_finite() {
                return Err(CompileError::invalid_argument(format!("non-finite double constant {v}")));
            }
            v.to_string()
        }
        ConstantValue::Single(v) => {
            let v = v.into_inner();
            if !v.is_finite() {
                return Err(CompileError::invalid_argument(format!("non-finite single constant {v}")));
            }
            v.to_string()
        }
        ConstantValue::DateTimeOffset(_) => return Err(CompileError::unsupported("DateTimeOffset literal")),
        ConstantValue::Time(_) => return Err(CompileError::unsupported("Time literal")),
    };
    Ok(text)
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn hex_literal(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
    format!("X'{hex}'")
}

/// Integers this long already read as decimal and need no cast.
const MAX_INTEGRAL_DIGITS: usize = 20;

// Shorter integral decimals keep a cast so the store does not read them as integers.
fn decimal_literal(d: &DecimalValue) -> String {
    let text = d.to_string();
    if text.contains('.') {
        return text;
    }
    let digits = text.trim_start_matches('-').len();
    if digits >= MAX_INTEGRAL_DIGITS {
        return text;
    }
    let precision = digits.max(Facets::DEFAULT_DECIMAL_PRECISION as usize);
    format!("CAST({text} AS DECIMAL({precision}))")
}
