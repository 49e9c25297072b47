use crate::ast::Span;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("syntax error: {message} ({span})")]
    Syntax { message: String, span: Span },

    #[error("undefined symbol '{ident}' ({span})")]
    UndefinedSymbol { ident: String, span: Span },

    #[error("redefinition of '{ident}' ({span})")]
    RedefinedSymbol { ident: String, span: Span },

    #[error("ambiguous call to '{ident}' ({span}); candidates are: {candidates}")]
    AmbiguousOverload {
        ident: String,
        candidates: String,
        span: Span,
    },

    #[error("{message} ({span})")]
    TypeMismatch { message: String, span: Span },

    #[error("intrinsic '{ident}' expects between {min} and {max} arguments, got {got} ({span})")]
    IntrinsicMisuse {
        ident: String,
        min: usize,
        max: usize,
        got: usize,
        span: Span,
    },

    #[error("unsupported feature: {message} ({span})")]
    UnsupportedFeature { message: String, span: Span },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompilerError {
    /// Wraps a bare projection/cast failure message with the location of
    /// the AST node it was raised for.
    pub fn type_mismatch(message: impl Into<String>, span: Span) -> Self {
        CompilerError::TypeMismatch {
            message: message.into(),
            span,
        }
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        CompilerError::Syntax {
            message: message.into(),
            span,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompilerError>;
