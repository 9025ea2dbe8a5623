//! Pagination passes
//!
//! Engines that support `OFFSET` require an `ORDER BY` on the same query.
//! [`correct_pagination`] derives one for queries that skip rows without an
//! ordering. [`emulate_pagination`] rewrites `OFFSET`/`FETCH` into a
//! `ROW_NUMBER()` filter for engines that lack both.

use super::optimizer::Pass;
use crate::builder::IdGenerator;
use crate::error::{Error, NodeRef, Result};
use crate::expressions::{
    precedence, BinaryOperator, Column, ColumnRef, DataType, Expression, OrderByItem, SelectQuery,
    SourceOrigin, Statement, TableSource,
};
use crate::rewrite::transform_queries;
use tracing::trace;

/// Alias of the row number column added by [`emulate_pagination`].
pub const ROW_NUMBER_ALIAS: &str = "row_num";

/// Alias of the derived table wrapped by [`emulate_pagination`].
pub const PAGED_SOURCE_ALIAS: &str = "paged";

const DISTINCT_SOURCE_ALIAS: &str = "distinct_rows";

/// Give every query with a skip bound and no ordering an `ORDER BY` over its
/// projected columns.
///
/// A query without columns first projects the identifying keys of its first
/// source. Fails with "pagination requires ordering" when there is still
/// nothing to order by.
pub fn correct_pagination(statement: Statement) -> Result<Statement> {
    transform_queries(statement, correct_query)
}

fn correct_query(mut query: SelectQuery) -> Result<SelectQuery> {
    if !query.has_skip() || !query.order_by.is_empty() {
        return Ok(query);
    }

    if query.select.columns.is_empty() {
        let keys = query
            .from
            .first()
            .map(TableSource::key_expressions)
            .unwrap_or_default();
        for key in keys {
            query.add_column(key);
        }
    }

    query.order_by = query
        .select
        .columns
        .iter()
        .map(|column| OrderByItem::asc(column.expression.clone()))
        .collect();

    if query.order_by.is_empty() {
        return Err(Error::pagination_requires_ordering(query.id));
    }

    trace!(
        query = %query.id,
        columns = query.order_by.len(),
        "ordering paginated query by its projection"
    );
    Ok(query)
}

/// Rewrite every query with a skip bound into
///
/// ```sql
/// SELECT paged.c1, ... FROM (
///     SELECT c1, ..., ROW_NUMBER() OVER (ORDER BY ...) AS row_num FROM ...
/// ) paged
/// WHERE paged.row_num > skip [AND paged.row_num <= skip + take]
/// ORDER BY paged.row_num
/// ```
///
/// The wrapper keeps the id of the original query, so column references to
/// it from enclosing queries stay valid. A DISTINCT query is first moved
/// into a derived table of its own, since the row number would make every
/// row distinct. Queries with only a take bound are left alone.
pub fn emulate_pagination(statement: Statement) -> Result<Statement> {
    let mut ids = IdGenerator::after(&statement);
    transform_queries(statement, |query| emulate_query(query, &mut ids))
}

fn emulate_query(mut inner: SelectQuery, ids: &mut IdGenerator) -> Result<SelectQuery> {
    let Some(skip) = inner.select.skip.take() else {
        return Ok(inner);
    };
    if inner.order_by.is_empty() {
        return Err(Error::pass(
            Pass::EmulatePagination,
            NodeRef::Query(inner.id),
            "pagination requires ordering",
        ));
    }

    let take = inner.select.take.take();
    let outer_id = inner.id;
    if inner.select.distinct {
        inner = separate_distinct(inner, ids)?;
    }
    inner.id = ids.next_query_id();

    let mut format = String::from("ROW_NUMBER() OVER (ORDER BY ");
    let mut args = Vec::with_capacity(inner.order_by.len());
    for (index, item) in std::mem::take(&mut inner.order_by).into_iter().enumerate() {
        if index > 0 {
            format.push_str(", ");
        }
        format.push_str(&format!("{{{index}}}"));
        if item.desc {
            format.push_str(" DESC");
        }
        args.push(item.expression);
    }
    format.push(')');

    let mut outer = SelectQuery::new(outer_id);
    for (index, column) in inner.select.columns.iter().enumerate() {
        outer.select.columns.push(Column {
            expression: Expression::ColumnRef(ColumnRef {
                query: inner.id,
                index,
                data_type: column.expression.data_type(),
            }),
            alias: column.alias.clone(),
        });
    }

    let row_number_index = inner.select.columns.len();
    inner.select.columns.push(
        Column::new(Expression::raw(format, precedence::PRIMARY, args, DataType::Int64))
            .with_alias(ROW_NUMBER_ALIAS),
    );
    let row_number = Expression::ColumnRef(ColumnRef {
        query: inner.id,
        index: row_number_index,
        data_type: DataType::Int64,
    });

    outer.add_where(Expression::binary(
        row_number.clone(),
        BinaryOperator::Greater,
        skip.clone(),
        DataType::Boolean,
    ));
    if let Some(take) = take {
        let upper = Expression::binary(skip, BinaryOperator::Add, take, DataType::Int64);
        outer.add_where(Expression::binary(
            row_number.clone(),
            BinaryOperator::LessOrEqual,
            upper,
            DataType::Boolean,
        ));
    }
    outer.order_by_asc(row_number);

    trace!(query = %outer_id, inner = %inner.id, "emulating pagination with ROW_NUMBER");

    let source = TableSource::new(ids.next_source_id(), SourceOrigin::Query(Box::new(inner)))
        .with_alias(PAGED_SOURCE_ALIAS);
    outer.from.push(source);
    Ok(outer)
}

/// Move a DISTINCT query into a derived table of its own and return a plain
/// query over it with the ordering mapped onto the distinct columns.
///
/// The row number is then computed over rows that are already distinct.
fn separate_distinct(mut distinct: SelectQuery, ids: &mut IdGenerator) -> Result<SelectQuery> {
    let order_by = std::mem::take(&mut distinct.order_by);
    let mut query = SelectQuery::new(distinct.id);
    distinct.id = ids.next_query_id();

    for (index, column) in distinct.select.columns.iter().enumerate() {
        query.select.columns.push(Column {
            expression: Expression::ColumnRef(ColumnRef {
                query: distinct.id,
                index,
                data_type: column.expression.data_type(),
            }),
            alias: column.alias.clone(),
        });
    }

    for item in order_by {
        let Some(index) = distinct
            .select
            .columns
            .iter()
            .position(|column| column.expression == item.expression)
        else {
            return Err(Error::pass(
                Pass::EmulatePagination,
                NodeRef::Query(query.id),
                "DISTINCT ordering must be projected",
            ));
        };
        query.order_by.push(OrderByItem {
            expression: query.select.columns[index].expression.clone(),
            desc: item.desc,
        });
    }

    trace!(query = %query.id, distinct = %distinct.id, "paging over a distinct derived table");

    let source = TableSource::new(ids.next_source_id(), SourceOrigin::Query(Box::new(distinct)))
        .with_alias(DISTINCT_SOURCE_ALIAS);
    query.from.push(source);
    Ok(query)
}
