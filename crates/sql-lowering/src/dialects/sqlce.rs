//! SQL Server Compact Edition Dialect
//!
//! SQL CE lacks multi-table DML, rejects bound parameters as inserted column
//! values, and has no interval type. The conversions below cover its
//! modulo, `Convert` and date arithmetic restrictions.

use super::{DialectCapabilities, DialectImpl, DialectType};
use crate::error::Result;
use crate::expressions::{
    precedence, BinaryOp, BinaryOperator, DataType, Expression, Function, FunctionFlags, Literal,
};
use crate::optimizer::{try_evaluate, EvaluationContext};
use crate::time::interval_increment;
use tracing::trace;

/// Characters SQL CE's LIKE treats as wildcards
const LIKE_SQLCE_CHARACTERS_TO_ESCAPE: &[&str] = &["_", "%"];

/// Convert style 114: `hh:mi:ss:mmm`
const TIME_TEXT: &str = "Convert(NChar, {0}, 114)";
const TIME_OF_DATETIME: &str = "Cast(Convert(NChar, {0}, 114) as DateTime)";
const DATE_OF_DATETIME: &str = "Cast(Floor(Cast({0} as Float)) as DateTime)";

/// SQL Server Compact Edition dialect
pub struct SqlCeDialect;

impl DialectImpl for SqlCeDialect {
    fn dialect_type(&self) -> DialectType {
        DialectType::SqlCe
    }

    fn capabilities(&self) -> DialectCapabilities {
        DialectCapabilities {
            supports_offset_fetch: true,
            bound_parameters_in_functions: true,
            bound_parameters_in_insert_columns: false,
            supports_multi_table_dml: false,
        }
    }

    fn like_characters_to_escape(&self) -> &[&'static str] {
        LIKE_SQLCE_CHARACTERS_TO_ESCAPE
    }

    fn convert_expression(
        &self,
        expr: Expression,
        context: &EvaluationContext,
    ) -> Result<Expression> {
        match expr {
            Expression::BinaryOp(op) => Ok(convert_binary(*op, context)),
            Expression::Function(f) if f.is("Convert") => Ok(convert_function(*f)),
            other => Ok(other),
        }
    }
}

fn convert_binary(op: BinaryOp, context: &EvaluationContext) -> Expression {
    match op.operator {
        // Modulo only accepts integer operands
        BinaryOperator::Modulo if !op.left.data_type().is_integer() => {
            trace!(from = %op.left.data_type(), "casting modulo operand to Int32");
            let left = Expression::convert(DataType::Int32, op.left);
            let mut converted = BinaryOp::new(left, op.operator, op.right, DataType::Int32);
            converted.precedence = op.precedence;
            Expression::BinaryOp(Box::new(converted))
        }
        BinaryOperator::Add => date_add(&op.left, &op.right, false, context)
            .or_else(|| date_add(&op.right, &op.left, false, context))
            .unwrap_or_else(|| Expression::BinaryOp(Box::new(op))),
        BinaryOperator::Subtract => date_add(&op.left, &op.right, true, context)
            .unwrap_or_else(|| Expression::BinaryOp(Box::new(op))),
        _ => Expression::BinaryOp(Box::new(op)),
    }
}

/// `date ± interval` with a constant interval becomes `DateAdd(unit, n, date)`.
///
/// Returns `None` when the operands are not a date and an interval, or when
/// the interval does not evaluate to a constant.
fn date_add(
    date: &Expression,
    interval: &Expression,
    subtract: bool,
    context: &EvaluationContext,
) -> Option<Expression> {
    if !date.data_type().is_temporal() || !interval.data_type().is_duration() {
        return None;
    }

    let (unit, count) = match try_evaluate(interval, context)? {
        Literal::Null => {
            trace!(data_type = %date.data_type(), "date arithmetic with null interval");
            return Some(Expression::null(date.data_type()));
        }
        Literal::Interval(duration) => {
            let (unit, count) = interval_increment(duration);
            let count = if subtract { count.checked_neg()? } else { count };
            (unit, count)
        }
        _ => return None,
    };

    trace!(unit = unit.name(), count, "synthesizing DateAdd");
    Some(Expression::Function(Box::new(Function {
        name: "DateAdd".to_string(),
        data_type: date.data_type(),
        args: vec![
            Expression::raw(unit.name(), precedence::PRIMARY, Vec::new(), DataType::NVarChar),
            Expression::long(count),
            date.clone(),
        ],
        flags: FunctionFlags {
            nullable: date.can_be_null() || interval.can_be_null(),
            ..Default::default()
        },
    })))
}

fn convert_function(mut f: Function) -> Expression {
    if f.args.len() != 2 {
        return Expression::Function(Box::new(f));
    }

    match f.data_type {
        DataType::UInt64 if f.args[1].data_type().is_float() => {
            trace!("flooring floating point value before UInt64 conversion");
            let value = std::mem::take(&mut f.args[1]);
            let value_type = value.data_type();
            f.args[1] = Expression::function("Floor", value_type, vec![value]);
            Expression::Function(Box::new(f))
        }
        DataType::Date | DataType::DateTime | DataType::Time => {
            let target = match &f.args[0] {
                Expression::DataType(target) => *target,
                _ => return Expression::Function(Box::new(f)),
            };
            let data_type = f.data_type;
            let value_type = f.args[1].data_type();

            match target {
                DataType::Time if value_type.is_temporal() => {
                    let value = f.args.swap_remove(1);
                    Expression::raw(TIME_OF_DATETIME, precedence::PRIMARY, vec![value], data_type)
                }
                DataType::Time if value_type.is_text() => f.args.swap_remove(1),
                DataType::Time => {
                    let value = f.args.swap_remove(1);
                    Expression::raw(TIME_TEXT, precedence::PRIMARY, vec![value], data_type)
                }
                DataType::Date if value_type.is_temporal() => {
                    let value = f.args.swap_remove(1);
                    Expression::raw(DATE_OF_DATETIME, precedence::PRIMARY, vec![value], data_type)
                }
                _ => Expression::Function(Box::new(f)),
            }
        }
        _ => Expression::Function(Box::new(f)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::{FieldRef, SourceId};
    use crate::rewrite::transform_expression_up;
    use crate::time::IntervalUnit;
    use chrono::TimeDelta;

    fn ctx() -> EvaluationContext {
        EvaluationContext::new()
    }

    fn convert(expr: Expression) -> Expression {
        SqlCeDialect.convert_expression(expr, &ctx()).unwrap()
    }

    fn field(name: &str, data_type: DataType) -> Expression {
        Expression::Field(FieldRef {
            source: SourceId(1),
            name: name.to_string(),
            data_type,
            nullable: false,
        })
    }

    fn minutes(n: i64) -> Expression {
        Expression::literal(Literal::Interval(TimeDelta::try_minutes(n).unwrap()))
    }

    fn date_add_parts(expr: &Expression) -> (String, i64, &Expression) {
        let Expression::Function(f) = expr else {
            panic!("expected DateAdd, got {:?}", expr);
        };
        assert_eq!(f.name, "DateAdd");
        let Expression::Raw(unit) = &f.args[0] else {
            panic!("expected unit");
        };
        let Expression::Value(count) = &f.args[1] else {
            panic!("expected count");
        };
        assert_eq!(count.data_type, DataType::Int64);
        let Literal::Int(count) = count.value else {
            panic!("expected integer count");
        };
        (unit.format.clone(), count, &f.args[2])
    }

    #[test]
    fn test_escape_set() {
        assert_eq!(SqlCeDialect.like_characters_to_escape(), &["_", "%"]);
    }

    #[test]
    fn test_modulo_casts_non_integer_operand() {
        let expr = Expression::binary(
            field("price", DataType::Decimal),
            BinaryOperator::Modulo,
            Expression::int(3),
            DataType::Decimal,
        );
        let Expression::BinaryOp(op) = convert(expr) else {
            panic!("expected modulo");
        };
        assert_eq!(op.data_type, DataType::Int32);
        assert_eq!(op.precedence, precedence::MULTIPLICATIVE);
        assert_eq!(
            op.left,
            Expression::convert(DataType::Int32, field("price", DataType::Decimal))
        );
    }

    #[test]
    fn test_integer_modulo_untouched() {
        let expr = Expression::binary(
            field("n", DataType::Int64),
            BinaryOperator::Modulo,
            Expression::int(3),
            DataType::Int64,
        );
        assert_eq!(convert(expr.clone()), expr);
    }

    #[test]
    fn test_uint64_convert_floors_float() {
        let expr = Expression::convert(DataType::UInt64, field("ratio", DataType::Double));
        let Expression::Function(f) = convert(expr) else {
            panic!("expected Convert");
        };
        assert_eq!(f.args[0], Expression::DataType(DataType::UInt64));
        let floor = f.args[1].as_function().unwrap();
        assert!(floor.is("Floor"));
        assert_eq!(floor.args[0], field("ratio", DataType::Double));
    }

    #[test]
    fn test_time_conversions() {
        let to_time = |value: Expression| {
            Expression::function(
                "Convert",
                DataType::DateTime,
                vec![Expression::DataType(DataType::Time), value],
            )
        };

        let Expression::Raw(raw) = convert(to_time(field("at", DataType::DateTime))) else {
            panic!("expected raw template");
        };
        assert_eq!(raw.format, "Cast(Convert(NChar, {0}, 114) as DateTime)");
        assert_eq!(raw.data_type, DataType::DateTime);

        let text = field("label", DataType::NVarChar);
        assert_eq!(convert(to_time(text.clone())), text);

        let Expression::Raw(raw) = convert(to_time(field("n", DataType::Int32))) else {
            panic!("expected raw template");
        };
        assert_eq!(raw.format, "Convert(NChar, {0}, 114)");
    }

    #[test]
    fn test_date_conversion_truncates_time() {
        let expr = Expression::convert(DataType::Date, field("at", DataType::DateTime));
        let Expression::Raw(raw) = convert(expr) else {
            panic!("expected raw template");
        };
        assert_eq!(raw.format, "Cast(Floor(Cast({0} as Float)) as DateTime)");
        assert_eq!(raw.args, vec![field("at", DataType::DateTime)]);
    }

    #[test]
    fn test_ninety_minutes_is_minute_unit() {
        let at = field("at", DataType::DateTime);
        let plus = Expression::binary(at.clone(), BinaryOperator::Add, minutes(90), DataType::DateTime);
        let result = convert(plus);
        let (unit, count, date) = date_add_parts(&result);
        assert_eq!(unit, IntervalUnit::Minute.name());
        assert_eq!(count, 90);
        assert_eq!(date, &at);
        assert_eq!(result.data_type(), DataType::DateTime);

        let minus =
            Expression::binary(at.clone(), BinaryOperator::Subtract, minutes(90), DataType::DateTime);
        let (unit, count, _) = date_add_parts(&convert(minus));
        assert_eq!(unit, "minute");
        assert_eq!(count, -90);
    }

    #[test]
    fn test_interval_first_addition() {
        let at = field("at", DataType::Date);
        let expr = Expression::binary(
            Expression::literal(Literal::Interval(TimeDelta::try_days(2).unwrap())),
            BinaryOperator::Add,
            at.clone(),
            DataType::Date,
        );
        let result = convert(expr);
        let (unit, count, date) = date_add_parts(&result);
        assert_eq!((unit.as_str(), count), ("day", 2));
        assert_eq!(date, &at);
    }

    #[test]
    fn test_null_interval_gives_typed_null() {
        let expr = Expression::binary(
            field("at", DataType::DateTimeOffset),
            BinaryOperator::Add,
            Expression::null(DataType::Interval),
            DataType::DateTimeOffset,
        );
        assert_eq!(convert(expr), Expression::null(DataType::DateTimeOffset));
    }

    #[test]
    fn test_unfoldable_interval_unchanged() {
        let expr = Expression::binary(
            field("at", DataType::DateTime),
            BinaryOperator::Add,
            field("span", DataType::Interval),
            DataType::DateTime,
        );
        assert_eq!(convert(expr.clone()), expr);

        let reversed = Expression::binary(
            field("span", DataType::Interval),
            BinaryOperator::Add,
            field("at", DataType::DateTime),
            DataType::DateTime,
        );
        assert_eq!(convert(reversed.clone()), reversed);
    }

    #[test]
    fn test_parameter_interval_uses_context_value() {
        let expr = Expression::binary(
            field("at", DataType::DateTime),
            BinaryOperator::Add,
            Expression::parameter(
                "span",
                Literal::Interval(TimeDelta::try_hours(1).unwrap()),
                DataType::Interval,
            ),
            DataType::DateTime,
        );
        let context = ctx().with_parameter(
            "span",
            Literal::Interval(TimeDelta::try_seconds(30).unwrap()),
        );
        let result = SqlCeDialect.convert_expression(expr, &context).unwrap();
        let (unit, count, _) = date_add_parts(&result);
        assert_eq!((unit.as_str(), count), ("second", 30));
    }

    #[test]
    fn test_date_add_synthesis_is_idempotent() {
        let expr = Expression::binary(
            field("at", DataType::DateTime),
            BinaryOperator::Add,
            minutes(90),
            DataType::DateTime,
        );
        let once = transform_expression_up(expr, |e| SqlCeDialect.convert_expression(e, &ctx()))
            .unwrap();
        let twice =
            transform_expression_up(once.clone(), |e| SqlCeDialect.convert_expression(e, &ctx()))
                .unwrap();
        assert_eq!(once, twice);
    }
}
