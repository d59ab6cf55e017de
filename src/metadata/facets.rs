use serde::{Deserialize, Serialize};

/// Optional type facets attached to a primitive type usage.
///
/// Every facet is optional; consumers fall back to their own defaults when a
/// facet is absent (strings are unicode, decimals have precision 18, values
/// are nullable).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Facets {
    pub max_length: Option<u32>,
    pub fixed_length: Option<bool>,
    pub unicode: Option<bool>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub nullable: Option<bool>,
}

impl Facets {
    pub const DEFAULT_DECIMAL_PRECISION: u8 = 18;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_length(mut self, len: u32) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn fixed_length(mut self, fixed: bool) -> Self {
        self.fixed_length = Some(fixed);
        self
    }

    pub fn unicode(mut self, unicode: bool) -> Self {
        self.unicode = Some(unicode);
        self
    }

    pub fn decimal(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable.unwrap_or(true)
    }

    pub fn is_unicode(&self) -> bool {
        self.unicode.unwrap_or(true)
    }

    pub fn is_fixed_length(&self) -> bool {
        self.fixed_length.unwrap_or(false)
    }

    pub fn precision_or_default(&self) -> u8 {
        self.precision.unwrap_or(Self::DEFAULT_DECIMAL_PRECISION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_absent() {
        let f = Facets::new();
        assert!(f.is_nullable());
        assert!(f.is_unicode());
        assert!(!f.is_fixed_length());
        assert_eq!(f.precision_or_default(), 18);
    }

    #[test]
    fn partial_json_fills_missing_facets() {
        let f: Facets = serde_json::from_str(r#"{"max_length": 64, "unicode": false}"#).unwrap();
        assert_eq!(f.max_length, Some(64));
        assert!(!f.is_unicode());
        assert!(f.nullable.is_none());
    }
}
