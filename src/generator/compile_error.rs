use thiserror::Error;

/// Failure raised while turning a command tree into query text.
///
/// Compilation is all-or-nothing: any error aborts the whole tree and no
/// partial text is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The node has no translation in the target dialect.
    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// No strategy could build the key predicate of a returning clause.
    #[error("missing value for key member '{member}' in table '{table}'")]
    MissingKeyValue { table: String, member: String },

    /// Empty or malformed input at a public entry point.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An internal contract between compiler stages was broken.
    #[error("invalid compiler state: {0}")]
    InvalidState(String),

    /// The catalog document could not be read or understood.
    #[error("catalog error: {0}")]
    Catalog(String),
}

pub type CompileResult<T> = Result<T, CompileError>;

impl CompileError {
    pub fn unsupported(what: impl Into<String>) -> Self {
        CompileError::UnsupportedConstruct(what.into())
    }

    pub fn invalid_argument(what: impl Into<String>) -> Self {
        CompileError::InvalidArgument(what.into())
    }

    pub fn invalid_state(what: impl Into<String>) -> Self {
        CompileError::InvalidState(what.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let e = CompileError::MissingKeyValue { table: "Win32_Process".into(), member: "Handle".into() };
        assert_eq!(e.to_string(), "missing value for key member 'Handle' in table 'Win32_Process'");
        assert_eq!(
            CompileError::unsupported("WITH TIES").to_string(),
            "unsupported construct: WITH TIES"
        );
    }
}
