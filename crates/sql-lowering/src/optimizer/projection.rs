//! Empty projection fix-up
//!
//! Some engines reject `SELECT *` on a grouped query. A grouped query with
//! no projected column gets the constant column `1`.

use crate::error::Result;
use crate::expressions::{Expression, SelectQuery, Statement};
use crate::rewrite::transform_queries;
use tracing::trace;

/// Append the constant column `1` to every grouped query without columns.
pub fn fix_empty_projection(statement: Statement) -> Result<Statement> {
    transform_queries(statement, |query| Ok(fix_query(query)))
}

fn fix_query(mut query: SelectQuery) -> SelectQuery {
    if !query.group_by.is_empty() && query.select.columns.is_empty() {
        trace!(query = %query.id, "adding constant projection to grouped query");
        query.add_column(Expression::int(1));
    }
    query
}
