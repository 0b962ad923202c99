use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::tokenizer::{tokenize, Token};

/// Recursive-descent parser for directive expressions
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<(Token<'src>, std::ops::Range<usize>)>,
    pos: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> ParseResult<Self> {
        let tokens = tokenize(source)?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
        })
    }

    /// Parse a single expression spanning the whole input
    pub fn parse_single(&mut self) -> ParseResult<Expression> {
        let expr = self.parse_expression()?;
        self.expect_end()?;
        Ok(expr)
    }

    /// Parse a `;`-separated statement list (event handler bodies)
    pub fn parse_statements(&mut self) -> ParseResult<Vec<Expression>> {
        let mut statements = Vec::new();

        loop {
            while self.match_token(Token::Semicolon) {}
            if self.is_at_end() {
                break;
            }

            statements.push(self.parse_expression()?);

            if !self.match_token(Token::Semicolon) && !self.is_at_end() {
                return Err(ParseError::unexpected_token(
                    self.current_pos(),
                    "';' or end of input",
                    Self::format_token(self.peek()),
                ));
            }
        }

        Ok(statements)
    }

    /// Parse an `x-for` clause: `item in items` or `(item, index) in items`
    pub fn parse_for_clause(&mut self) -> ParseResult<ForClause> {
        let (item, index) = if self.match_token(Token::LParen) {
            let item = self.expect_ident()?;
            let index = if self.match_token(Token::Comma) {
                Some(self.expect_ident()?)
            } else {
                None
            };
            self.expect(Token::RParen)?;
            (item, index)
        } else {
            (self.expect_ident()?, None)
        };

        self.expect(Token::In)?;
        let collection = self.parse_expression()?;
        self.expect_end()?;

        Ok(ForClause {
            item,
            index,
            collection,
        })
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_assignment_expression()
    }

    /// Parse assignment (right associative, lowest precedence)
    fn parse_assignment_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let target = self.parse_conditional_expression()?;

        if self.check(Token::Assign) {
            if !target.is_assignable() {
                return Err(ParseError::invalid_syntax(
                    start,
                    "invalid assignment target",
                ));
            }
            self.advance();
            let value = self.parse_assignment_expression()?;
            return Ok(Expression::Assign {
                target: Box::new(target),
                value: Box::new(value),
                span: Span::new(start, self.last_end()),
            });
        }

        Ok(target)
    }

    /// Parse ternary conditional
    fn parse_conditional_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let test = self.parse_or_expression()?;

        if self.match_token(Token::Question) {
            let consequent = self.parse_assignment_expression()?;
            self.expect(Token::Colon)?;
            let alternate = self.parse_assignment_expression()?;
            return Ok(Expression::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
                span: Span::new(start, self.last_end()),
            });
        }

        Ok(test)
    }

    /// Parse OR expression
    fn parse_or_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_and_expression()?;

        while self.match_token(Token::Or) {
            let right = self.parse_and_expression()?;
            left = self.binary(left, BinaryOp::Or, right, start);
        }

        Ok(left)
    }

    /// Parse AND expression
    fn parse_and_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_equality_expression()?;

        while self.match_token(Token::And) {
            let right = self.parse_equality_expression()?;
            left = self.binary(left, BinaryOp::And, right, start);
        }

        Ok(left)
    }

    /// Parse equality expression (== != === !==)
    fn parse_equality_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_comparison_expression()?;

        while let Some(op) = self.match_equality_op() {
            let right = self.parse_comparison_expression()?;
            left = self.binary(left, op, right, start);
        }

        Ok(left)
    }

    /// Parse comparison expression (< > <= >=)
    fn parse_comparison_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_additive_expression()?;

        while let Some(op) = self.match_comparison_op() {
            let right = self.parse_additive_expression()?;
            left = self.binary(left, op, right, start);
        }

        Ok(left)
    }

    /// Parse additive expression (+ -)
    fn parse_additive_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_multiplicative_expression()?;

        while let Some(op) = self.match_additive_op() {
            let right = self.parse_multiplicative_expression()?;
            left = self.binary(left, op, right, start);
        }

        Ok(left)
    }

    /// Parse multiplicative expression (* / %)
    fn parse_multiplicative_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut left = self.parse_unary_expression()?;

        while let Some(op) = self.match_multiplicative_op() {
            let right = self.parse_unary_expression()?;
            left = self.binary(left, op, right, start);
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();

        let operator = if self.match_token(Token::Bang) {
            UnaryOp::Not
        } else if self.match_token(Token::Minus) {
            UnaryOp::Negate
        } else {
            return self.parse_postfix_expression();
        };

        let operand = self.parse_unary_expression()?;
        Ok(Expression::Unary {
            operator,
            operand: Box::new(operand),
            span: Span::new(start, self.last_end()),
        })
    }

    /// Parse member and computed access chains: `a.b[c].d`
    fn parse_postfix_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        let mut expr = self.parse_primary_expression()?;

        loop {
            if self.match_token(Token::Dot) {
                let property = self.expect_ident()?;
                expr = Expression::Member {
                    object: Box::new(expr),
                    property,
                    span: Span::new(start, self.last_end()),
                };
            } else if self.match_token(Token::LBracket) {
                let index = self.parse_expression()?;
                self.expect(Token::RBracket)?;
                expr = Expression::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    span: Span::new(start, self.last_end()),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Parse primary expression (literals, identifiers, groups, object/array literals)
    fn parse_primary_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();

        let literal = match self.peek() {
            Some((Token::String(s), _)) => Some(Literal::String(unescape(s))),
            Some((Token::Number(n), _)) => {
                let value = n
                    .parse::<f64>()
                    .map_err(|_| ParseError::invalid_syntax(start, format!("invalid number {}", n)))?;
                Some(Literal::Number(value))
            }
            Some((Token::True, _)) => Some(Literal::Boolean(true)),
            Some((Token::False, _)) => Some(Literal::Boolean(false)),
            Some((Token::Null, _)) => Some(Literal::Null),
            Some((Token::Undefined, _)) => Some(Literal::Undefined),
            _ => None,
        };

        if let Some(value) = literal {
            self.advance();
            return Ok(Expression::Literal {
                value,
                span: Span::new(start, self.last_end()),
            });
        }

        match self.peek() {
            Some((Token::Ident(name), _)) => {
                let name = name.to_string();
                self.advance();
                Ok(Expression::Identifier {
                    name,
                    span: Span::new(start, self.last_end()),
                })
            }
            Some((Token::LParen, _)) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some((Token::LBrace, _)) => self.parse_object_literal(),
            Some((Token::LBracket, _)) => self.parse_array_literal(),
            None => Err(ParseError::unexpected_eof(self.source.len())),
            found => Err(ParseError::unexpected_token(
                start,
                "expression",
                Self::format_token(found),
            )),
        }
    }

    /// Parse `{key: value, shorthand, 'quoted': value, ...spread}`
    fn parse_object_literal(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        self.expect(Token::LBrace)?;

        let mut properties = Vec::new();
        while !self.check(Token::RBrace) && !self.is_at_end() {
            if self.match_token(Token::Ellipsis) {
                properties.push(ObjectProperty::Spread(self.parse_assignment_expression()?));
            } else {
                let key_start = self.current_pos();
                let (key, shorthand) = match self.peek() {
                    Some((Token::Ident(name), _)) => (name.to_string(), true),
                    Some((Token::String(s), _)) => (unescape(s), false),
                    Some((Token::Number(n), _)) => (n.to_string(), false),
                    found => {
                        return Err(ParseError::unexpected_token(
                            key_start,
                            "property name",
                            Self::format_token(found),
                        ))
                    }
                };
                self.advance();

                let value = if self.match_token(Token::Colon) {
                    self.parse_assignment_expression()?
                } else if shorthand {
                    Expression::Identifier {
                        name: key.clone(),
                        span: Span::new(key_start, self.last_end()),
                    }
                } else {
                    return Err(ParseError::unexpected_token(
                        self.current_pos(),
                        "':'",
                        Self::format_token(self.peek()),
                    ));
                };

                properties.push(ObjectProperty::KeyValue { key, value });
            }

            if !self.match_token(Token::Comma) {
                break;
            }
        }

        self.expect(Token::RBrace)?;
        Ok(Expression::Object {
            properties,
            span: Span::new(start, self.last_end()),
        })
    }

    /// Parse `[a, b, ...rest]`
    fn parse_array_literal(&mut self) -> ParseResult<Expression> {
        let start = self.current_pos();
        self.expect(Token::LBracket)?;

        let mut elements = Vec::new();
        while !self.check(Token::RBracket) && !self.is_at_end() {
            if self.match_token(Token::Ellipsis) {
                elements.push(ArrayElement::Spread(self.parse_assignment_expression()?));
            } else {
                elements.push(ArrayElement::Item(self.parse_assignment_expression()?));
            }

            if !self.match_token(Token::Comma) {
                break;
            }
        }

        self.expect(Token::RBracket)?;
        Ok(Expression::Array {
            elements,
            span: Span::new(start, self.last_end()),
        })
    }

    fn binary(&self, left: Expression, operator: BinaryOp, right: Expression, start: usize) -> Expression {
        Expression::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            span: Span::new(start, self.last_end()),
        }
    }

    // Helper methods for matching operators

    fn match_equality_op(&mut self) -> Option<BinaryOp> {
        if self.match_token(Token::StrictEquals) {
            Some(BinaryOp::StrictEquals)
        } else if self.match_token(Token::StrictNotEquals) {
            Some(BinaryOp::StrictNotEquals)
        } else if self.match_token(Token::EqualsEquals) {
            Some(BinaryOp::Equals)
        } else if self.match_token(Token::NotEquals) {
            Some(BinaryOp::NotEquals)
        } else {
            None
        }
    }

    fn match_comparison_op(&mut self) -> Option<BinaryOp> {
        if self.match_token(Token::LessThanEquals) {
            Some(BinaryOp::LessThanOrEqual)
        } else if self.match_token(Token::GreaterThanEquals) {
            Some(BinaryOp::GreaterThanOrEqual)
        } else if self.match_token(Token::LAngle) {
            Some(BinaryOp::LessThan)
        } else if self.match_token(Token::RAngle) {
            Some(BinaryOp::GreaterThan)
        } else {
            None
        }
    }

    fn match_additive_op(&mut self) -> Option<BinaryOp> {
        if self.match_token(Token::Plus) {
            Some(BinaryOp::Add)
        } else if self.match_token(Token::Minus) {
            Some(BinaryOp::Subtract)
        } else {
            None
        }
    }

    fn match_multiplicative_op(&mut self) -> Option<BinaryOp> {
        if self.match_token(Token::Star) {
            Some(BinaryOp::Multiply)
        } else if self.match_token(Token::Slash) {
            Some(BinaryOp::Divide)
        } else if self.match_token(Token::Percent) {
            Some(BinaryOp::Remainder)
        } else {
            None
        }
    }

    // Helper methods

    fn peek(&self) -> Option<&(Token<'src>, std::ops::Range<usize>)> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&(Token<'src>, std::ops::Range<usize>)> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, token: Token) -> bool {
        if let Some((t, _)) = self.peek() {
            std::mem::discriminant(t) == std::mem::discriminant(&token)
        } else {
            false
        }
    }

    fn match_token(&mut self, token: Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> ParseResult<()> {
        if self.check(token.clone()) {
            self.advance();
            Ok(())
        } else if self.is_at_end() {
            Err(ParseError::unexpected_eof(self.source.len()))
        } else {
            Err(ParseError::unexpected_token(
                self.current_pos(),
                token.to_string(),
                Self::format_token(self.peek()),
            ))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some((Token::Ident(s), _)) => {
                let val = s.to_string();
                self.advance();
                Ok(val)
            }
            None => Err(ParseError::unexpected_eof(self.source.len())),
            found => Err(ParseError::unexpected_token(
                self.current_pos(),
                "identifier",
                Self::format_token(found),
            )),
        }
    }

    fn expect_end(&self) -> ParseResult<()> {
        match self.peek() {
            None => Ok(()),
            found => Err(ParseError::unexpected_token(
                self.current_pos(),
                "end of input",
                Self::format_token(found),
            )),
        }
    }

    /// Start offset of the next token (or end of input)
    fn current_pos(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.source.len())
    }

    /// End offset of the last consumed token
    fn last_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|(_, span)| span.end)
            .unwrap_or(0)
    }

    fn format_token(token: Option<&(Token, std::ops::Range<usize>)>) -> String {
        match token {
            None => "end of input".to_string(),
            Some((token, _)) => token.to_string(),
        }
    }
}

/// Strip quotes and resolve escape sequences of a string token
fn unescape(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }

    result
}

/// Parse a single expression (`x-text`, `x-bind`, `x-props`, `x-data`)
pub fn parse_expression(source: &str) -> ParseResult<Expression> {
    Parser::new(source)?.parse_single()
}

/// Parse an event handler body
pub fn parse_statements(source: &str) -> ParseResult<Vec<Expression>> {
    Parser::new(source)?.parse_statements()
}

/// Parse an `x-for` clause
pub fn parse_for_clause(source: &str) -> ParseResult<ForClause> {
    Parser::new(source)?.parse_for_clause()
}
