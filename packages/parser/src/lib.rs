pub mod ast;
pub mod error;
pub mod markup;
pub mod parser;
pub mod tokenizer;

pub use error::{ParseError, ParseResult};
pub use markup::{parse_markup, MarkupElement, MarkupNode};
pub use parser::{parse_expression, parse_for_clause, parse_statements, Parser};
pub use tokenizer::{tokenize, Token};
