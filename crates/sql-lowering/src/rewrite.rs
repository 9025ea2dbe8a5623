//! Structural rewrites of statement trees.
//!
//! A [`Rewriter`] is walked over a tree by [`rewrite_statement`],
//! [`rewrite_query`] or [`rewrite_expression`]. Each hook receives a node by
//! value and returns the node to put back at the same parent link, so a
//! replacement never disturbs the positions around it.
//!
//! Pre-order hooks (`enter_*`) return a [`Step`]: [`Step::Descend`] continues
//! into the children of the returned node, [`Step::Stop`] puts the node in
//! place without looking inside it. Stopping is how a one-shot replacement
//! avoids re-visiting the subtree it just built. Post-order hooks (`leave_*`)
//! see a node after all of its children were rewritten, which is the
//! bottom-up order used by expression conversions.
//!
//! The walk owns the tree. If a hook fails, the error is returned and the
//! partially rewritten tree is dropped with it.

use crate::error::Result;
use crate::expressions::{Expression, SelectQuery, SourceOrigin, Statement, TableSource};

/// Outcome of a pre-order hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    /// Keep walking into the children of this node.
    Descend(T),
    /// Put this node in place and skip its children.
    Stop(T),
}

impl<T> Step<T> {
    pub fn into_inner(self) -> T {
        match self {
            Step::Descend(node) | Step::Stop(node) => node,
        }
    }
}

/// Hooks invoked by the rewrite walk. Every hook defaults to "keep the node".
pub trait Rewriter {
    fn enter_expression(&mut self, expr: Expression) -> Result<Step<Expression>> {
        Ok(Step::Descend(expr))
    }

    fn leave_expression(&mut self, expr: Expression) -> Result<Expression> {
        Ok(expr)
    }

    fn enter_query(&mut self, query: SelectQuery) -> Result<Step<SelectQuery>> {
        Ok(Step::Descend(query))
    }

    fn leave_query(&mut self, query: SelectQuery) -> Result<SelectQuery> {
        Ok(query)
    }
}

/// Rewrite every query and expression of a statement.
pub fn rewrite_statement<R>(statement: Statement, rewriter: &mut R) -> Result<Statement>
where
    R: Rewriter + ?Sized,
{
    let statement = match statement {
        Statement::Select(mut s) => {
            rewrite_query_in_place(&mut s.query, rewriter)?;
            Statement::Select(s)
        }
        Statement::Insert(mut s) => {
            for item in &mut s.items {
                rewrite_in_place(&mut item.expression, rewriter)?;
            }
            rewrite_query_in_place(&mut s.query, rewriter)?;
            Statement::Insert(s)
        }
        Statement::Update(mut s) => {
            for item in &mut s.items {
                rewrite_in_place(&mut item.expression, rewriter)?;
            }
            rewrite_query_in_place(&mut s.query, rewriter)?;
            Statement::Update(s)
        }
        Statement::Delete(mut s) => {
            rewrite_query_in_place(&mut s.query, rewriter)?;
            Statement::Delete(s)
        }
        Statement::Merge(mut s) => {
            rewrite_source(&mut s.target, rewriter)?;
            rewrite_query_in_place(&mut s.source, rewriter)?;
            rewrite_option(&mut s.on, rewriter)?;
            for operation in &mut s.operations {
                rewrite_option(&mut operation.condition, rewriter)?;
                for item in &mut operation.items {
                    rewrite_in_place(&mut item.expression, rewriter)?;
                }
            }
            Statement::Merge(s)
        }
        other @ (Statement::CreateTable(_) | Statement::DropTable(_)) => other,
    };
    Ok(statement)
}

/// Rewrite a query and everything below it.
pub fn rewrite_query<R>(query: SelectQuery, rewriter: &mut R) -> Result<SelectQuery>
where
    R: Rewriter + ?Sized,
{
    let mut query = match rewriter.enter_query(query)? {
        Step::Stop(query) => return Ok(query),
        Step::Descend(query) => query,
    };

    for column in &mut query.select.columns {
        rewrite_in_place(&mut column.expression, rewriter)?;
    }
    rewrite_option(&mut query.select.skip, rewriter)?;
    rewrite_option(&mut query.select.take, rewriter)?;
    for source in &mut query.from {
        rewrite_source(source, rewriter)?;
    }
    rewrite_option(&mut query.where_clause, rewriter)?;
    for expr in &mut query.group_by {
        rewrite_in_place(expr, rewriter)?;
    }
    rewrite_option(&mut query.having, rewriter)?;
    for item in &mut query.order_by {
        rewrite_in_place(&mut item.expression, rewriter)?;
    }

    rewriter.leave_query(query)
}

/// Rewrite an expression and everything below it.
pub fn rewrite_expression<R>(expr: Expression, rewriter: &mut R) -> Result<Expression>
where
    R: Rewriter + ?Sized,
{
    let mut expr = match rewriter.enter_expression(expr)? {
        Step::Stop(expr) => return Ok(expr),
        Step::Descend(expr) => expr,
    };

    match &mut expr {
        Expression::Function(f) => {
            for arg in &mut f.args {
                rewrite_in_place(arg, rewriter)?;
            }
        }
        Expression::BinaryOp(b) => {
            rewrite_in_place(&mut b.left, rewriter)?;
            rewrite_in_place(&mut b.right, rewriter)?;
        }
        Expression::Raw(r) => {
            for arg in &mut r.args {
                rewrite_in_place(arg, rewriter)?;
            }
        }
        Expression::Subquery(q) | Expression::Exists(q) => {
            rewrite_query_in_place(q, rewriter)?;
        }
        Expression::Value(_)
        | Expression::Parameter(_)
        | Expression::Field(_)
        | Expression::ColumnRef(_)
        | Expression::DataType(_) => {}
    }

    rewriter.leave_expression(expr)
}

fn rewrite_source<R>(source: &mut TableSource, rewriter: &mut R) -> Result<()>
where
    R: Rewriter + ?Sized,
{
    if let SourceOrigin::Query(query) = &mut source.origin {
        rewrite_query_in_place(query, rewriter)?;
    }
    for join in &mut source.joins {
        rewrite_source(&mut join.source, rewriter)?;
        rewrite_option(&mut join.condition, rewriter)?;
    }
    Ok(())
}

fn rewrite_in_place<R>(slot: &mut Expression, rewriter: &mut R) -> Result<()>
where
    R: Rewriter + ?Sized,
{
    let expr = std::mem::take(slot);
    *slot = rewrite_expression(expr, rewriter)?;
    Ok(())
}

fn rewrite_option<R>(slot: &mut Option<Expression>, rewriter: &mut R) -> Result<()>
where
    R: Rewriter + ?Sized,
{
    if let Some(expr) = slot {
        rewrite_in_place(expr, rewriter)?;
    }
    Ok(())
}

fn rewrite_query_in_place<R>(slot: &mut SelectQuery, rewriter: &mut R) -> Result<()>
where
    R: Rewriter + ?Sized,
{
    let query = std::mem::take(slot);
    *slot = rewrite_query(query, rewriter)?;
    Ok(())
}

struct UpMap<F>(F);

impl<F> Rewriter for UpMap<F>
where
    F: FnMut(Expression) -> Result<Expression>,
{
    fn leave_expression(&mut self, expr: Expression) -> Result<Expression> {
        (self.0)(expr)
    }
}

struct DownMap<F>(F);

impl<F> Rewriter for DownMap<F>
where
    F: FnMut(Expression) -> Result<Step<Expression>>,
{
    fn enter_expression(&mut self, expr: Expression) -> Result<Step<Expression>> {
        (self.0)(expr)
    }
}

struct QueryMap<F>(F);

impl<F> Rewriter for QueryMap<F>
where
    F: FnMut(SelectQuery) -> Result<SelectQuery>,
{
    fn enter_query(&mut self, query: SelectQuery) -> Result<Step<SelectQuery>> {
        (self.0)(query).map(Step::Descend)
    }
}

/// Bottom-up expression map: children are rewritten before `fun` sees their
/// parent.
pub fn transform_up<F>(statement: Statement, fun: F) -> Result<Statement>
where
    F: FnMut(Expression) -> Result<Expression>,
{
    rewrite_statement(statement, &mut UpMap(fun))
}

/// Same as [`transform_up`] for a lone expression.
pub fn transform_expression_up<F>(expr: Expression, fun: F) -> Result<Expression>
where
    F: FnMut(Expression) -> Result<Expression>,
{
    rewrite_expression(expr, &mut UpMap(fun))
}

/// Top-down expression map with an explicit descend/stop decision per node.
pub fn transform_down<F>(statement: Statement, fun: F) -> Result<Statement>
where
    F: FnMut(Expression) -> Result<Step<Expression>>,
{
    rewrite_statement(statement, &mut DownMap(fun))
}

/// Apply `fun` to every query of the statement, outer queries first.
pub fn transform_queries<F>(statement: Statement, fun: F) -> Result<Statement>
where
    F: FnMut(SelectQuery) -> Result<SelectQuery>,
{
    rewrite_statement(statement, &mut QueryMap(fun))
}
