//! First-pass expression evaluation for `terragrunt.hcl`.
//!
//! Per spec §4.6/§9, this is deliberately *not* a full HCL function
//! evaluator: Terragrunt-specific functions (`find_in_parent_folders`,
//! `get_env`, `path_relative_to_include`) are recognised and stubbed with
//! deterministic defaults, which is sufficient for dependency resolution —
//! the only consumer of parsed config that needs these values to exist at
//! all. Anything else unrecognised degrades to its textual form rather than
//! failing the parse.

use hcl::expr::{BinaryOperator, Expression, ObjectKey, Operation, UnaryOperator};
use serde_json::{Map, Number, Value};

/// Evaluate an HCL expression into a JSON value, recording a warning for
/// every construct this first-pass evaluator had to approximate.
pub fn eval_expr(expr: &Expression, warnings: &mut Vec<String>) -> Value {
    match expr {
        Expression::Null => Value::Null,
        Expression::Bool(b) => Value::Bool(*b),
        Expression::Number(n) => number_to_json(n),
        Expression::String(s) => Value::String(s.clone()),
        Expression::Array(items) => {
            Value::Array(items.iter().map(|i| eval_expr(i, warnings)).collect())
        }
        Expression::Object(obj) => {
            let mut map = Map::new();
            for (k, v) in obj.iter() {
                map.insert(object_key(k, warnings), eval_expr(v, warnings));
            }
            Value::Object(map)
        }
        Expression::TemplateExpr(t) => Value::String(strip_quotes(&t.to_string())),
        Expression::Traversal(t) => Value::String(t.to_string()),
        Expression::Variable(v) => Value::String(v.to_string()),
        Expression::Parenthesis(inner) => eval_expr(inner, warnings),
        Expression::FuncCall(call) => eval_func_call(call, warnings),
        Expression::Conditional(cond) => {
            let truthy = eval_expr(&cond.cond_expr, warnings)
                .as_bool()
                .unwrap_or(false);
            if truthy {
                eval_expr(&cond.true_expr, warnings)
            } else {
                eval_expr(&cond.false_expr, warnings)
            }
        }
        Expression::Operation(op) => eval_operation(op, warnings),
        other => {
            warnings.push(format!(
                "unsupported expression form approximated as text: {}",
                other
            ));
            Value::String(other.to_string())
        }
    }
}

fn eval_operation(op: &Operation, warnings: &mut Vec<String>) -> Value {
    match op {
        Operation::Unary(u) => {
            let operand = eval_expr(&u.expr, warnings);
            match u.operator {
                UnaryOperator::Not => Value::Bool(!operand.as_bool().unwrap_or(false)),
                UnaryOperator::Neg => operand
                    .as_f64()
                    .and_then(|f| Number::from_f64(-f))
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            }
        }
        Operation::Binary(b) => {
            let lhs = eval_expr(&b.lhs_expr, warnings);
            let rhs = eval_expr(&b.rhs_expr, warnings);
            match b.operator {
                BinaryOperator::Eq => Value::Bool(lhs == rhs),
                BinaryOperator::NotEq => Value::Bool(lhs != rhs),
                BinaryOperator::And => Value::Bool(
                    lhs.as_bool().unwrap_or(false) && rhs.as_bool().unwrap_or(false),
                ),
                BinaryOperator::Or => Value::Bool(
                    lhs.as_bool().unwrap_or(false) || rhs.as_bool().unwrap_or(false),
                ),
                _ => {
                    warnings.push("arithmetic/comparison operator approximated as lhs".into());
                    lhs
                }
            }
        }
    }
}

fn eval_func_call(call: &hcl::expr::FuncCall, warnings: &mut Vec<String>) -> Value {
    let args: Vec<Value> = call.args.iter().map(|a| eval_expr(a, warnings)).collect();
    match call.name.as_str() {
        // Deterministic default: no parent search is actually performed —
        // the resolver only needs a stable placeholder path.
        "find_in_parent_folders" => Value::String(
            args.first()
                .and_then(|v| v.as_str())
                .unwrap_or("terragrunt.hcl")
                .to_string(),
        ),
        // Deterministic default: consult the real environment, falling back
        // to the literal default argument (never an error, per spec §4.6).
        "get_env" => {
            let name = args.first().and_then(|v| v.as_str()).unwrap_or_default();
            let default = args.get(1).and_then(|v| v.as_str()).unwrap_or_default();
            Value::String(std::env::var(name).unwrap_or_else(|_| default.to_string()))
        }
        "path_relative_to_include" => Value::String(".".to_string()),
        other => {
            warnings.push(format!("function '{}' not evaluated, returning null", other));
            Value::Null
        }
    }
}

fn number_to_json(n: &hcl::expr::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(Number::from(i))
    } else if let Some(f) = n.as_f64() {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    } else {
        Value::Null
    }
}

fn object_key(key: &ObjectKey, warnings: &mut Vec<String>) -> String {
    match key {
        ObjectKey::Identifier(ident) => ident.to_string(),
        ObjectKey::Expression(expr) => match eval_expr(expr, warnings) {
            Value::String(s) => s,
            other => other.to_string(),
        },
        other => other.to_string(),
    }
}

fn strip_quotes(s: &str) -> String {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
        .to_string()
}

/// Coerce a JSON value to a flat `String -> String` map (used for
/// `remote_state.config` and similar flat-object attributes).
pub fn as_flat_string_map(value: &Value) -> std::collections::HashMap<String, Value> {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => std::collections::HashMap::new(),
    }
}

pub fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(|s| s.to_string())
}

pub fn as_bool(value: &Value) -> bool {
    value.as_bool().unwrap_or(false)
}

pub fn as_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}
