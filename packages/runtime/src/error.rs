use thiserror::Error;
use xprops_parser::ParseError;
use xprops_reactive::EvalError;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Markup parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("No element matches selector '{selector}'")]
    NodeNotFound { selector: String },

    #[error("Invalid directive '{name}': {message}")]
    InvalidDirective { name: String, message: String },

    #[error("Component hook failed: {0}")]
    Hook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Json(#[from] serde_json::Error),
}
