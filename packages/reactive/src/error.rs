use thiserror::Error;
use xprops_parser::ast::Span;
use xprops_parser::ParseError;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Type error at {span:?}: {message}")]
    TypeError { message: String, span: Span },

    #[error("Invalid operands for operator {operator} at {span:?}: {details}")]
    InvalidOperands {
        operator: String,
        details: String,
        span: Span,
    },

    #[error("Invalid assignment target at {span:?}")]
    InvalidAssignment { span: Span },

    #[error("Range error: {message}")]
    RangeError { message: String },

    #[error("No scope to assign '{name}' into")]
    NoScope { name: String },
}

impl EvalError {
    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        EvalError::TypeError {
            message: message.into(),
            span,
        }
    }
}
