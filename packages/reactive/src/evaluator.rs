//! # Expression Evaluator
//!
//! Evaluates directive expressions against an [`EvalContext`].
//!
//! Reads go through reactive stores, so evaluating inside an effect
//! subscribes that effect to everything the expression touched. Object and
//! array literals produce plain values; any store reachable through them
//! (`{foo: user}`) stays a `Reactive` handle to the original store.

use crate::context::EvalContext;
use crate::error::{EvalError, EvalResult};
use crate::value::{format_number, Value};
use indexmap::IndexMap;
use tracing::{debug, instrument, trace};
use xprops_parser::ast::{ArrayElement, BinaryOp, Expression, Literal, ObjectProperty, Span, UnaryOp};
use xprops_parser::{parse_expression, parse_statements};

/// Evaluate a single expression
pub fn evaluate(expr: &Expression, ctx: &EvalContext) -> EvalResult<Value> {
    Evaluator { ctx }.evaluate_expression(expr)
}

/// Run a statement list (`a = 1; b = 2`), returning the last value
pub fn execute(statements: &[Expression], ctx: &EvalContext) -> EvalResult<Value> {
    let evaluator = Evaluator { ctx };
    let mut last = Value::Undefined;
    for statement in statements {
        last = evaluator.evaluate_expression(statement)?;
    }
    Ok(last)
}

/// Parse and evaluate a single expression
#[instrument(level = "trace", skip(ctx))]
pub fn evaluate_source(source: &str, ctx: &EvalContext) -> EvalResult<Value> {
    let expr = parse_expression(source)?;
    evaluate(&expr, ctx)
}

/// Parse and run a statement list
#[instrument(level = "trace", skip(ctx))]
pub fn execute_source(source: &str, ctx: &EvalContext) -> EvalResult<Value> {
    let statements = parse_statements(source)?;
    execute(&statements, ctx)
}

/// Read `key` from a value the way a property access would
pub fn get_member(object: &Value, key: &str, span: Span) -> EvalResult<Value> {
    match object {
        Value::Undefined | Value::Null => Err(EvalError::type_error(
            format!(
                "Cannot read properties of {} (reading '{}')",
                object.type_name(),
                key
            ),
            span,
        )),
        Value::Reactive(store) => Ok(store.get(key)),
        Value::Object(map) => Ok(map.get(key).cloned().unwrap_or(Value::Undefined)),
        Value::Array(items) => Ok(if key == "length" {
            Value::Number(items.len() as f64)
        } else {
            key.parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Undefined)
        }),
        Value::String(s) => Ok(if key == "length" {
            Value::Number(s.chars().count() as f64)
        } else {
            key.parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Undefined)
        }),
        Value::Boolean(_) | Value::Number(_) => Ok(Value::Undefined),
    }
}

struct Evaluator<'a> {
    ctx: &'a EvalContext,
}

impl<'a> Evaluator<'a> {
    fn evaluate_expression(&self, expr: &Expression) -> EvalResult<Value> {
        match expr {
            Expression::Literal { value, .. } => Ok(match value {
                Literal::String(s) => Value::String(s.clone()),
                Literal::Number(n) => Value::Number(*n),
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Null => Value::Null,
                Literal::Undefined => Value::Undefined,
            }),

            Expression::Identifier { name, .. } => {
                let value = self.ctx.lookup(name);
                trace!(identifier = %name, value = ?value, "Resolved identifier");
                Ok(value)
            }

            Expression::Object { properties, .. } => {
                let mut map = IndexMap::new();
                for property in properties {
                    match property {
                        ObjectProperty::KeyValue { key, value } => {
                            map.insert(key.clone(), self.evaluate_expression(value)?);
                        }
                        ObjectProperty::Spread(source) => {
                            let source = self.evaluate_expression(source)?;
                            map.extend(spread_entries(&source));
                        }
                    }
                }
                Ok(Value::Object(map))
            }

            Expression::Array { elements, .. } => {
                let mut items = Vec::new();
                for element in elements {
                    match element {
                        ArrayElement::Item(item) => items.push(self.evaluate_expression(item)?),
                        ArrayElement::Spread(source) => {
                            let value = self.evaluate_expression(source)?;
                            items.extend(spread_items(&value, source.span())?);
                        }
                    }
                }
                Ok(Value::Array(items))
            }

            Expression::Member {
                object,
                property,
                span,
            } => {
                let object = self.evaluate_expression(object)?;
                get_member(&object, property, *span)
            }

            Expression::Index {
                object,
                index,
                span,
            } => {
                let object = self.evaluate_expression(object)?;
                let key = property_key(&self.evaluate_expression(index)?);
                get_member(&object, &key, *span)
            }

            Expression::Unary {
                operator, operand, ..
            } => {
                let value = self.evaluate_expression(operand)?;
                Ok(match operator {
                    UnaryOp::Not => Value::Boolean(!value.is_truthy()),
                    UnaryOp::Negate => Value::Number(-value.to_number()),
                })
            }

            Expression::Binary {
                left,
                operator,
                right,
                span,
            } => {
                let left = self.evaluate_expression(left)?;
                match operator {
                    BinaryOp::And if !left.is_truthy() => return Ok(left),
                    BinaryOp::Or if left.is_truthy() => return Ok(left),
                    BinaryOp::And | BinaryOp::Or => return self.evaluate_expression(right),
                    _ => {}
                }
                let right = self.evaluate_expression(right)?;
                binary(*operator, &left, &right, *span)
            }

            Expression::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                if self.evaluate_expression(test)?.is_truthy() {
                    self.evaluate_expression(consequent)
                } else {
                    self.evaluate_expression(alternate)
                }
            }

            Expression::Assign {
                target,
                value,
                span,
            } => {
                let value = self.evaluate_expression(value)?;
                self.assign(target, value.clone(), *span)?;
                Ok(value)
            }
        }
    }

    fn assign(&self, target: &Expression, value: Value, span: Span) -> EvalResult<()> {
        match target {
            Expression::Identifier { name, .. } => self.ctx.assign(name, value),
            Expression::Member {
                object, property, ..
            } => {
                let object = self.evaluate_expression(object)?;
                set_member(&object, property, value, span)
            }
            Expression::Index { object, index, .. } => {
                let object = self.evaluate_expression(object)?;
                let key = property_key(&self.evaluate_expression(index)?);
                set_member(&object, &key, value, span)
            }
            _ => Err(EvalError::InvalidAssignment { span }),
        }
    }
}

fn set_member(object: &Value, key: &str, value: Value, span: Span) -> EvalResult<()> {
    match object {
        Value::Reactive(store) => store.try_set(key, value),
        Value::Object(_) | Value::Array(_) => {
            debug!(key, "Assignment into a temporary value discarded");
            Ok(())
        }
        _ => Err(EvalError::type_error(
            format!(
                "Cannot set properties of {} (setting '{}')",
                object.type_name(),
                key
            ),
            span,
        )),
    }
}

fn property_key(value: &Value) -> String {
    match value {
        Value::Number(n) => format_number(*n),
        other => other.to_js_string(),
    }
}

fn spread_entries(source: &Value) -> Vec<(String, Value)> {
    match source {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Value::Reactive(store) => store.entries(),
        Value::String(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::String(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

fn spread_items(source: &Value, span: Span) -> EvalResult<Vec<Value>> {
    match source {
        Value::Array(items) => Ok(items.clone()),
        Value::Reactive(store) if store.is_array() => Ok(store.items()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        other => Err(EvalError::type_error(
            format!("{} is not iterable", other.type_name()),
            span,
        )),
    }
}

fn binary(operator: BinaryOp, left: &Value, right: &Value, span: Span) -> EvalResult<Value> {
    match operator {
        BinaryOp::Add => {
            let concat = |v: &Value| {
                matches!(v, Value::String(_)) || v.is_object_like() || v.is_array_like()
            };
            if concat(left) || concat(right) {
                Ok(Value::String(format!(
                    "{}{}",
                    left.to_js_string(),
                    right.to_js_string()
                )))
            } else {
                Ok(Value::Number(left.to_number() + right.to_number()))
            }
        }

        BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Remainder => {
            for operand in [left, right] {
                if operand.is_object_like() || operand.is_array_like() {
                    return Err(EvalError::InvalidOperands {
                        operator: operator.symbol().to_string(),
                        details: format!(
                            "Expected numeric operands, got {} {} {}",
                            left.type_name(),
                            operator.symbol(),
                            right.type_name()
                        ),
                        span,
                    });
                }
            }
            let (a, b) = (left.to_number(), right.to_number());
            Ok(Value::Number(match operator {
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide => a / b,
                _ => a % b,
            }))
        }

        BinaryOp::StrictEquals => Ok(Value::Boolean(left == right)),
        BinaryOp::StrictNotEquals => Ok(Value::Boolean(left != right)),
        BinaryOp::Equals => Ok(Value::Boolean(loose_equals(left, right))),
        BinaryOp::NotEquals => Ok(Value::Boolean(!loose_equals(left, right))),

        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Boolean(false));
            };
            Ok(Value::Boolean(match operator {
                BinaryOp::LessThan => ordering.is_lt(),
                BinaryOp::LessThanOrEqual => ordering.is_le(),
                BinaryOp::GreaterThan => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }

        // Short-circuit operators are handled before both sides are evaluated
        BinaryOp::And | BinaryOp::Or => Ok(right.clone()),
    }
}

fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Boolean(_), _)
        | (_, Value::Boolean(_)) => left.to_number() == right.to_number(),
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::Reactor;
    use crate::store::Store;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn context(reactor: &Reactor, data: serde_json::Value) -> (EvalContext, Store) {
        let Value::Reactive(store) = Store::wrap(reactor, Value::from_json(data)) else {
            panic!("Expected object data");
        };
        (EvalContext::component(store.clone(), None, "$props"), store)
    }

    fn eval(ctx: &EvalContext, source: &str) -> Value {
        evaluate_source(source, ctx).unwrap()
    }

    #[test]
    fn test_literals_and_arithmetic() {
        let ctx = EvalContext::empty();
        assert_eq!(eval(&ctx, "1 + 2 * 3"), Value::from(7.0));
        assert_eq!(eval(&ctx, "(1 + 2) * 3"), Value::from(9.0));
        assert_eq!(eval(&ctx, "'a' + 1"), Value::from("a1"));
        assert_eq!(eval(&ctx, "-4 % 3"), Value::from(-1.0));
        assert_eq!(eval(&ctx, "!0"), Value::from(true));
        assert_eq!(eval(&ctx, "missing"), Value::Undefined);
    }

    #[test]
    fn test_logical_operators_return_operands() {
        let ctx = EvalContext::empty();
        assert_eq!(eval(&ctx, "'' || 'fallback'"), Value::from("fallback"));
        assert_eq!(eval(&ctx, "'x' && 'y'"), Value::from("y"));
        assert_eq!(eval(&ctx, "null && missing.deep"), Value::Null);
    }

    #[test]
    fn test_equality_and_comparison() {
        let ctx = EvalContext::empty();
        assert_eq!(eval(&ctx, "1 == '1'"), Value::from(true));
        assert_eq!(eval(&ctx, "1 === '1'"), Value::from(false));
        assert_eq!(eval(&ctx, "null == undefined"), Value::from(true));
        assert_eq!(eval(&ctx, "null === undefined"), Value::from(false));
        assert_eq!(eval(&ctx, "'a' < 'b'"), Value::from(true));
        assert_eq!(eval(&ctx, "2 >= 3"), Value::from(false));
        assert_eq!(eval(&ctx, "true ? 'yes' : 'no'"), Value::from("yes"));
    }

    #[test]
    fn test_member_access() {
        let reactor = Reactor::new();
        let (ctx, _) = context(&reactor, json!({"user": {"name": "Ada"}, "items": ["a", "b"]}));
        assert_eq!(eval(&ctx, "user.name"), Value::from("Ada"));
        assert_eq!(eval(&ctx, "items[1]"), Value::from("b"));
        assert_eq!(eval(&ctx, "items.length"), Value::from(2.0));
        assert_eq!(eval(&ctx, "user.name.length"), Value::from(3.0));
        assert_eq!(eval(&ctx, "user['missing']"), Value::Undefined);
    }

    #[test]
    fn test_member_of_undefined_is_type_error() {
        let ctx = EvalContext::empty();
        let err = evaluate_source("missing.foo", &ctx).unwrap_err();
        assert!(matches!(err, EvalError::TypeError { .. }));
        assert!(err.to_string().contains("reading 'foo'"));
    }

    #[test]
    fn test_object_literal_keeps_store_references() {
        let reactor = Reactor::new();
        let (ctx, store) = context(&reactor, json!({"user": {"name": "Ada"}, "foo": "bar"}));
        let value = eval(&ctx, "{foo, user, extra: 1}");
        let Value::Object(map) = value else {
            panic!("Expected plain object");
        };
        assert_eq!(map.get("foo"), Some(&Value::from("bar")));
        assert_eq!(map.get("user"), Some(&store.get("user")));
        assert_eq!(map.get("extra"), Some(&Value::from(1.0)));
    }

    #[test]
    fn test_spread() {
        let reactor = Reactor::new();
        let (ctx, _) = context(&reactor, json!({"items": ["item1", "item2"], "base": {"a": 1}}));
        assert_eq!(
            eval(&ctx, "[...items, 'item3']").to_json(),
            json!(["item1", "item2", "item3"])
        );
        assert_eq!(eval(&ctx, "{...base, b: 2}").to_json(), json!({"a": 1.0, "b": 2.0}));
        assert!(evaluate_source("[...missing]", &ctx).is_err());
    }

    #[test]
    fn test_assignment_writes_through_stores() {
        let reactor = Reactor::new();
        let (ctx, store) = context(&reactor, json!({"foo": "bar", "$props": {"foo": "x"}}));

        execute_source("foo = 'baz'; $props.foo = 'qux'", &ctx).unwrap();
        assert_eq!(store.get("foo"), Value::from("baz"));
        assert_eq!(eval(&ctx, "$props.foo"), Value::from("qux"));

        execute_source("items = [...[1], 2]", &ctx).unwrap();
        assert_eq!(eval(&ctx, "items.length"), Value::from(2.0));
    }

    #[test]
    fn test_assignment_to_primitive_member_fails() {
        let reactor = Reactor::new();
        let (ctx, _) = context(&reactor, json!({"foo": "bar"}));
        assert!(matches!(
            evaluate_source("foo.bar = 1", &ctx),
            Err(EvalError::TypeError { .. })
        ));
        assert!(matches!(
            evaluate_source("nothing.bar = 1", &ctx),
            Err(EvalError::TypeError { .. })
        ));
    }

    #[test]
    fn test_arithmetic_on_objects_is_rejected() {
        let reactor = Reactor::new();
        let (ctx, _) = context(&reactor, json!({"user": {}}));
        assert!(matches!(
            evaluate_source("user - 1", &ctx),
            Err(EvalError::InvalidOperands { .. })
        ));
    }

    #[test]
    fn test_evaluation_inside_effect_tracks_reads() {
        let reactor = Reactor::new();
        let (ctx, store) = context(&reactor, json!({"user": {"name": "Ada"}}));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        let effect_ctx = ctx.clone();
        reactor.effect(move || {
            let text = evaluate_source("'Hi ' + user.name", &effect_ctx)
                .map(|v| v.to_text())
                .unwrap_or_default();
            log.borrow_mut().push(text);
        });

        let Value::Reactive(user) = store.get("user") else {
            panic!("Expected nested store");
        };
        user.set("name", Value::from("Grace"));
        assert_eq!(*seen.borrow(), vec!["Hi Ada", "Hi Grace"]);
    }

    #[test]
    fn test_parse_errors_surface() {
        let err = evaluate_source("foo +", &EvalContext::empty()).unwrap_err();
        assert!(matches!(err, EvalError::Parse(_)));
    }

    #[test]
    fn test_oversized_array_writes_are_range_errors() {
        let reactor = Reactor::new();
        let (ctx, store) = context(&reactor, json!({"xs": [1, 2]}));

        let err = execute_source("xs.length = 100000000000000000000", &ctx).unwrap_err();
        assert!(matches!(err, EvalError::RangeError { .. }));
        let err = execute_source("xs[3000000000] = 1", &ctx).unwrap_err();
        assert!(matches!(err, EvalError::RangeError { .. }));
        assert!(execute_source("xs.length = -1", &ctx).is_err());

        assert_eq!(store.get("xs").to_json(), json!([1.0, 2.0]));
        execute_source("xs.length = 1", &ctx).unwrap();
        assert_eq!(store.get("xs").to_json(), json!([1.0]));
    }
}
