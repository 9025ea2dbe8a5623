//! Constant Evaluation
//!
//! Best-effort static evaluation of expression subtrees. Passes that need to
//! branch on a known constant (for example the unit of a date interval) call
//! [`try_evaluate`]; anything that reads a column, a subquery or an unknown
//! function simply does not fold. Failing to fold is the common case and is
//! reported as `None`, never as an error.

use crate::expressions::{BinaryOperator, DataType, Expression, Function, Literal};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Values visible to the evaluator beyond what the tree itself carries.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    parameter_values: HashMap<String, Literal>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the current value of the parameter called `name`.
    pub fn with_parameter(mut self, name: impl Into<String>, value: Literal) -> Self {
        self.parameter_values.insert(name.into(), value);
        self
    }

    pub fn parameter_value(&self, name: &str) -> Option<&Literal> {
        self.parameter_values.get(name)
    }
}

/// Try to fold `expr` into a literal.
///
/// Returns `None` when the expression depends on data (fields, columns,
/// subqueries), on engine text, on an impure or unknown function, or when
/// the in-process evaluation would overflow or divide by zero.
pub fn try_evaluate(expr: &Expression, ctx: &EvaluationContext) -> Option<Literal> {
    match expr {
        Expression::Value(v) => Some(v.value.clone()),
        Expression::Parameter(p) => Some(
            ctx.parameter_value(&p.name)
                .cloned()
                .unwrap_or_else(|| p.value.clone()),
        ),
        Expression::BinaryOp(b) => {
            let left = try_evaluate(&b.left, ctx)?;
            let right = try_evaluate(&b.right, ctx)?;
            eval_binary(b.operator, left, right)
        }
        Expression::Function(f) => eval_function(f, ctx),
        Expression::Field(_)
        | Expression::ColumnRef(_)
        | Expression::Raw(_)
        | Expression::DataType(_)
        | Expression::Subquery(_)
        | Expression::Exists(_) => None,
    }
}

/// Returns `true` if `expr` folds to a constant.
pub fn is_constant(expr: &Expression, ctx: &EvaluationContext) -> bool {
    try_evaluate(expr, ctx).is_some()
}

fn eval_binary(op: BinaryOperator, left: Literal, right: Literal) -> Option<Literal> {
    use BinaryOperator::*;

    match op {
        And => return eval_and(left, right),
        Or => return eval_or(left, right),
        _ => {}
    }

    if left.is_null() || right.is_null() {
        return Some(Literal::Null);
    }

    match op {
        Add | Subtract | Multiply | Divide | Modulo => eval_arithmetic(op, left, right),
        Concat => match (left, right) {
            (Literal::String(a), Literal::String(b)) => Some(Literal::String(a + &b)),
            _ => None,
        },
        Equal => compare(&left, &right).map(|o| Literal::Boolean(o == Ordering::Equal)),
        NotEqual => compare(&left, &right).map(|o| Literal::Boolean(o != Ordering::Equal)),
        Less => compare(&left, &right).map(|o| Literal::Boolean(o == Ordering::Less)),
        LessOrEqual => compare(&left, &right).map(|o| Literal::Boolean(o != Ordering::Greater)),
        Greater => compare(&left, &right).map(|o| Literal::Boolean(o == Ordering::Greater)),
        GreaterOrEqual => compare(&left, &right).map(|o| Literal::Boolean(o != Ordering::Less)),
        And | Or => None,
    }
}

fn eval_and(left: Literal, right: Literal) -> Option<Literal> {
    match (left, right) {
        (Literal::Boolean(false), _) | (_, Literal::Boolean(false)) => Some(Literal::Boolean(false)),
        (Literal::Boolean(true), Literal::Boolean(true)) => Some(Literal::Boolean(true)),
        (Literal::Null, Literal::Boolean(_) | Literal::Null)
        | (Literal::Boolean(_), Literal::Null) => Some(Literal::Null),
        _ => None,
    }
}

fn eval_or(left: Literal, right: Literal) -> Option<Literal> {
    match (left, right) {
        (Literal::Boolean(true), _) | (_, Literal::Boolean(true)) => Some(Literal::Boolean(true)),
        (Literal::Boolean(false), Literal::Boolean(false)) => Some(Literal::Boolean(false)),
        (Literal::Null, Literal::Boolean(_) | Literal::Null)
        | (Literal::Boolean(_), Literal::Null) => Some(Literal::Null),
        _ => None,
    }
}

fn eval_arithmetic(op: BinaryOperator, left: Literal, right: Literal) -> Option<Literal> {
    use BinaryOperator::*;

    match (left, right) {
        (Literal::Int(a), Literal::Int(b)) => int_op(op, a, b).map(Literal::Int),
        (Literal::UInt(a), Literal::UInt(b)) => uint_op(op, a, b).map(Literal::UInt),
        (Literal::Int(a), Literal::UInt(b)) => {
            int_op(op, a, i64::try_from(b).ok()?).map(Literal::Int)
        }
        (Literal::UInt(a), Literal::Int(b)) => {
            int_op(op, i64::try_from(a).ok()?, b).map(Literal::Int)
        }
        (a @ (Literal::Int(_) | Literal::UInt(_) | Literal::Float(_)), b) if is_number(&b) => {
            float_op(op, as_f64(&a)?, as_f64(&b)?).map(Literal::Float)
        }

        (Literal::String(a), Literal::String(b)) if op == Add => Some(Literal::String(a + &b)),

        (Literal::Interval(a), Literal::Interval(b)) => match op {
            Add => a.checked_add(&b).map(Literal::Interval),
            Subtract => a.checked_sub(&b).map(Literal::Interval),
            _ => None,
        },
        (Literal::Interval(d), Literal::Int(n)) => match op {
            Multiply => d.checked_mul(i32::try_from(n).ok()?).map(Literal::Interval),
            Divide => d.checked_div(i32::try_from(n).ok()?).map(Literal::Interval),
            _ => None,
        },
        (Literal::Int(n), Literal::Interval(d)) if op == Multiply => {
            d.checked_mul(i32::try_from(n).ok()?).map(Literal::Interval)
        }

        (Literal::Date(date), Literal::Interval(d)) => {
            shift_datetime(date.and_time(NaiveTime::MIN), op, d).map(Literal::DateTime)
        }
        (Literal::DateTime(dt), Literal::Interval(d)) => {
            shift_datetime(dt, op, d).map(Literal::DateTime)
        }
        (Literal::DateTimeOffset(dt), Literal::Interval(d)) => match op {
            Add => dt.checked_add_signed(d).map(Literal::DateTimeOffset),
            Subtract => dt.checked_sub_signed(d).map(Literal::DateTimeOffset),
            _ => None,
        },
        (Literal::Interval(d), Literal::DateTime(dt)) if op == Add => {
            dt.checked_add_signed(d).map(Literal::DateTime)
        }
        (Literal::Interval(d), Literal::Date(date)) if op == Add => date
            .and_time(NaiveTime::MIN)
            .checked_add_signed(d)
            .map(Literal::DateTime),
        (Literal::DateTime(a), Literal::DateTime(b)) if op == Subtract => {
            Some(Literal::Interval(a.signed_duration_since(b)))
        }

        _ => None,
    }
}

fn shift_datetime(dt: NaiveDateTime, op: BinaryOperator, d: TimeDelta) -> Option<NaiveDateTime> {
    match op {
        BinaryOperator::Add => dt.checked_add_signed(d),
        BinaryOperator::Subtract => dt.checked_sub_signed(d),
        _ => None,
    }
}

fn int_op(op: BinaryOperator, a: i64, b: i64) -> Option<i64> {
    match op {
        BinaryOperator::Add => a.checked_add(b),
        BinaryOperator::Subtract => a.checked_sub(b),
        BinaryOperator::Multiply => a.checked_mul(b),
        BinaryOperator::Divide => a.checked_div(b),
        BinaryOperator::Modulo => a.checked_rem(b),
        _ => None,
    }
}

fn uint_op(op: BinaryOperator, a: u64, b: u64) -> Option<u64> {
    match op {
        BinaryOperator::Add => a.checked_add(b),
        BinaryOperator::Subtract => a.checked_sub(b),
        BinaryOperator::Multiply => a.checked_mul(b),
        BinaryOperator::Divide => a.checked_div(b),
        BinaryOperator::Modulo => a.checked_rem(b),
        _ => None,
    }
}

fn float_op(op: BinaryOperator, a: f64, b: f64) -> Option<f64> {
    let result = match op {
        BinaryOperator::Add => a + b,
        BinaryOperator::Subtract => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide if b != 0.0 => a / b,
        BinaryOperator::Modulo if b != 0.0 => a % b,
        _ => return None,
    };
    result.is_finite().then_some(result)
}

fn is_number(lit: &Literal) -> bool {
    matches!(lit, Literal::Int(_) | Literal::UInt(_) | Literal::Float(_))
}

fn as_f64(lit: &Literal) -> Option<f64> {
    match lit {
        Literal::Int(n) => Some(*n as f64),
        Literal::UInt(n) => Some(*n as f64),
        Literal::Float(n) => Some(*n),
        _ => None,
    }
}

fn compare(left: &Literal, right: &Literal) -> Option<Ordering> {
    match (left, right) {
        (Literal::Int(a), Literal::Int(b)) => Some(a.cmp(b)),
        (Literal::UInt(a), Literal::UInt(b)) => Some(a.cmp(b)),
        (a, b) if is_number(a) && is_number(b) => as_f64(a)?.partial_cmp(&as_f64(b)?),
        (Literal::String(a), Literal::String(b)) => Some(a.cmp(b)),
        (Literal::Boolean(a), Literal::Boolean(b)) => Some(a.cmp(b)),
        (Literal::Date(a), Literal::Date(b)) => Some(a.cmp(b)),
        (Literal::DateTime(a), Literal::DateTime(b)) => Some(a.cmp(b)),
        (Literal::DateTimeOffset(a), Literal::DateTimeOffset(b)) => Some(a.cmp(b)),
        (Literal::Interval(a), Literal::Interval(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn eval_function(f: &Function, ctx: &EvaluationContext) -> Option<Literal> {
    if !f.flags.pure || f.flags.aggregate {
        return None;
    }

    let name = f.name.to_ascii_lowercase();
    match name.as_str() {
        "coalesce" => {
            for arg in &f.args {
                let value = try_evaluate(arg, ctx)?;
                if !value.is_null() {
                    return Some(value);
                }
            }
            Some(Literal::Null)
        }
        "convert" => match f.args.as_slice() {
            [Expression::DataType(target), value] => {
                convert_literal(*target, try_evaluate(value, ctx)?)
            }
            _ => None,
        },
        "floor" | "ceiling" | "abs" | "upper" | "lower" | "length" => {
            let [arg] = f.args.as_slice() else {
                return None;
            };
            let value = try_evaluate(arg, ctx)?;
            if value.is_null() {
                return Some(Literal::Null);
            }
            eval_unary_function(&name, value)
        }
        _ => None,
    }
}

fn eval_unary_function(name: &str, value: Literal) -> Option<Literal> {
    match (name, value) {
        ("floor", Literal::Float(n)) => Some(Literal::Float(n.floor())),
        ("ceiling", Literal::Float(n)) => Some(Literal::Float(n.ceil())),
        ("floor" | "ceiling", v @ (Literal::Int(_) | Literal::UInt(_))) => Some(v),
        ("abs", Literal::Int(n)) => n.checked_abs().map(Literal::Int),
        ("abs", Literal::UInt(n)) => Some(Literal::UInt(n)),
        ("abs", Literal::Float(n)) => Some(Literal::Float(n.abs())),
        ("abs", Literal::Interval(d)) => Some(Literal::Interval(d.abs())),
        ("upper", Literal::String(s)) => Some(Literal::String(s.to_uppercase())),
        ("lower", Literal::String(s)) => Some(Literal::String(s.to_lowercase())),
        ("length", Literal::String(s)) => Some(Literal::Int(s.chars().count() as i64)),
        _ => None,
    }
}

/// Engine-neutral conversion of a folded value; only numeric, text and
/// boolean targets are attempted.
fn convert_literal(target: DataType, value: Literal) -> Option<Literal> {
    if value.is_null() {
        return Some(Literal::Null);
    }

    match target {
        DataType::UInt64 => match value {
            Literal::Int(n) => u64::try_from(n).ok().map(Literal::UInt),
            Literal::UInt(n) => Some(Literal::UInt(n)),
            Literal::Float(n) if n >= 0.0 && n < u64::MAX as f64 => {
                Some(Literal::UInt(n.trunc() as u64))
            }
            Literal::String(s) => s.trim().parse().ok().map(Literal::UInt),
            _ => None,
        },
        t if t.is_integer() => match value {
            Literal::Int(n) => Some(Literal::Int(n)),
            Literal::UInt(n) => i64::try_from(n).ok().map(Literal::Int),
            Literal::Float(n) if n >= i64::MIN as f64 && n < i64::MAX as f64 => {
                Some(Literal::Int(n.trunc() as i64))
            }
            Literal::Boolean(b) => Some(Literal::Int(b as i64)),
            Literal::String(s) => s.trim().parse().ok().map(Literal::Int),
            _ => None,
        },
        t if t.is_float() => match value {
            Literal::String(s) => s.trim().parse().ok().map(Literal::Float),
            other => as_f64(&other).map(Literal::Float),
        },
        t if t.is_text() => match value {
            Literal::String(s) => Some(Literal::String(s)),
            Literal::Int(n) => Some(Literal::String(n.to_string())),
            Literal::UInt(n) => Some(Literal::String(n.to_string())),
            Literal::Float(n) => Some(Literal::String(n.to_string())),
            _ => None,
        },
        DataType::Boolean => match value {
            Literal::Boolean(b) => Some(Literal::Boolean(b)),
            Literal::Int(n) => Some(Literal::Boolean(n != 0)),
            _ => None,
        },
        _ => None,
    }
}
