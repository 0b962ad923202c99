use serde::{Deserialize, Serialize};

/// Span information for source location tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Expression (used in directive attributes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    /// Literal value (`'bar'`, `42`, `true`, `null`)
    Literal { value: Literal, span: Span },

    /// Identifier reference (`foo`, `$props`)
    Identifier { name: String, span: Span },

    /// Object literal (`{foo: foo, bar}`)
    Object {
        properties: Vec<ObjectProperty>,
        span: Span,
    },

    /// Array literal (`[...items, 'item3']`)
    Array {
        elements: Vec<ArrayElement>,
        span: Span,
    },

    /// Member access (obj.prop)
    Member {
        object: Box<Expression>,
        property: String,
        span: Span,
    },

    /// Computed member access (obj[expr])
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
        span: Span,
    },

    /// Unary operation (!a, -a)
    Unary {
        operator: UnaryOp,
        operand: Box<Expression>,
        span: Span,
    },

    /// Binary operation (a + b)
    Binary {
        left: Box<Expression>,
        operator: BinaryOp,
        right: Box<Expression>,
        span: Span,
    },

    /// Ternary conditional (test ? a : b)
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
        span: Span,
    },

    /// Assignment (`foo = 'baz'`, `$props.foo = 'baz'`)
    Assign {
        target: Box<Expression>,
        value: Box<Expression>,
        span: Span,
    },
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal { span, .. }
            | Expression::Identifier { span, .. }
            | Expression::Object { span, .. }
            | Expression::Array { span, .. }
            | Expression::Member { span, .. }
            | Expression::Index { span, .. }
            | Expression::Unary { span, .. }
            | Expression::Binary { span, .. }
            | Expression::Conditional { span, .. }
            | Expression::Assign { span, .. } => *span,
        }
    }

    /// Whether this expression may appear on the left of `=`
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expression::Identifier { .. } | Expression::Member { .. } | Expression::Index { .. }
        )
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    Undefined,
}

/// A single entry of an object literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectProperty {
    KeyValue { key: String, value: Expression },
    Spread(Expression),
}

/// A single entry of an array literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayElement {
    Item(Expression),
    Spread(Expression),
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equals,
    NotEquals,
    StrictEquals,
    StrictNotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::StrictEquals => "===",
            BinaryOp::StrictNotEquals => "!==",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// `x-for` clause: `(item, index) in items`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForClause {
    pub item: String,
    pub index: Option<String>,
    pub collection: Expression,
}
