//! Parameter de-binding passes
//!
//! A bound parameter is sent to the driver as a placeholder; an engine that
//! cannot bind a placeholder in some position needs the value written into
//! the statement text instead. These passes flip `is_bound` on the affected
//! parameters and change nothing else.

use crate::error::Result;
use crate::expressions::{Expression, SelectQuery, Statement};
use crate::rewrite::{rewrite_query, rewrite_statement, transform_up, Rewriter, Step};
use tracing::trace;

/// Inline parameters used directly as inserted values: projected columns of
/// the insert query and insert set items.
///
/// Only the outermost query of the insert is affected; nested queries keep
/// their bindings.
pub fn debind_insert_parameters(statement: Statement) -> Result<Statement> {
    let Statement::Insert(mut insert) = statement else {
        return Ok(statement);
    };

    for item in &mut insert.items {
        unbind_direct(&mut item.expression, &item.column);
    }
    let query = std::mem::take(&mut insert.query);
    insert.query = rewrite_query(query, &mut InsertColumns)?;

    Ok(Statement::Insert(insert))
}

/// Unbinds parameters that are a projected column of the visited query and
/// stops there, so parameters nested in expressions or subqueries stay bound.
struct InsertColumns;

impl Rewriter for InsertColumns {
    fn enter_query(&mut self, mut query: SelectQuery) -> Result<Step<SelectQuery>> {
        for (index, column) in query.select.columns.iter_mut().enumerate() {
            let position = column.alias.clone().unwrap_or_else(|| index.to_string());
            unbind_direct(&mut column.expression, &position);
        }
        Ok(Step::Stop(query))
    }
}

fn unbind_direct(expr: &mut Expression, position: &str) {
    if let Expression::Parameter(parameter) = expr {
        if parameter.is_bound() {
            trace!(parameter = %parameter.name, position, "inlining insert parameter");
            parameter.unbind();
        }
    }
}

/// Inline every parameter passed directly as a function argument, including
/// arguments of nested function calls.
pub fn inline_function_parameters(statement: Statement) -> Result<Statement> {
    transform_up(statement, |mut expr| {
        if let Expression::Function(function) = &mut expr {
            for arg in &mut function.args {
                if let Expression::Parameter(parameter) = arg {
                    if parameter.is_bound() {
                        trace!(
                            parameter = %parameter.name,
                            function = %function.name,
                            "inlining function parameter"
                        );
                        parameter.unbind();
                    }
                }
            }
        }
        Ok(expr)
    })
}

/// Inline every parameter of the statement.
pub fn inline_all_parameters(statement: Statement) -> Result<Statement> {
    struct InlineAll;

    impl Rewriter for InlineAll {
        fn enter_expression(&mut self, mut expr: Expression) -> Result<Step<Expression>> {
            if let Expression::Parameter(parameter) = &mut expr {
                parameter.unbind();
                return Ok(Step::Stop(expr));
            }
            Ok(Step::Descend(expr))
        }
    }

    rewrite_statement(statement, &mut InlineAll)
}
