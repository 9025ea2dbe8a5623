//! Multi-table DML rewriting
//!
//! Engines without `DELETE ... FROM a JOIN b` or `UPDATE ... FROM` get an
//! equivalent single-table statement:
//!
//! ```sql
//! DELETE FROM target AS $
//! WHERE EXISTS (
//!     SELECT 1 FROM <original sources and joins>
//!     WHERE <original predicate> AND target.key = $.key
//! )
//! ```
//!
//! For UPDATE, set values that read other sources become correlated scalar
//! subqueries over a renumbered copy of the original query, and values that
//! only read the target are remapped onto the new source.

use crate::builder::IdGenerator;
use crate::error::Result;
use crate::expressions::{
    Column, DeleteStatement, Expression, QueryId, SelectQuery, SourceId, SourceOrigin, Statement,
    TableRef, TableSource, UpdateStatement,
};
use crate::rewrite::{rewrite_expression, rewrite_query, Rewriter, Step};
use crate::traversal::{Node, TreeWalk};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Alias given to the single source of a rewritten statement. A numeric
/// suffix is appended when the statement already uses it.
pub const SYNTHETIC_ALIAS: &str = "$";

/// Rewrite a DELETE or UPDATE whose target needs a multi-table shape.
///
/// Statements that already have a single-table shape, other statement kinds,
/// and targets whose table has no known fields are returned unchanged.
pub fn rewrite_dml(statement: Statement) -> Result<Statement> {
    let mut ids = IdGenerator::after(&statement);
    let alias = synthetic_alias(&statement);

    match statement {
        Statement::Delete(delete) => {
            let Some(target) = plan(&delete.query, delete.target) else {
                return Ok(Statement::Delete(delete));
            };
            rewrite_delete(*delete, target, &alias, &mut ids)
        }
        Statement::Update(update) => {
            let Some(target) = plan(&update.query, update.target) else {
                return Ok(Statement::Update(update));
            };
            rewrite_update(*update, target, &alias, &mut ids)
        }
        other => Ok(other),
    }
}

struct Target {
    id: SourceId,
    table: TableRef,
}

fn plan(query: &SelectQuery, target: Option<SourceId>) -> Option<Target> {
    let first = query.from.first()?;
    let id = target.unwrap_or(first.id);
    if !query.is_multi_table() && first.id == id {
        return None;
    }

    let table = query.find_source(id)?.table()?;
    if table.fields.is_empty() {
        return None;
    }

    Some(Target {
        id,
        table: table.clone(),
    })
}

fn synthetic_alias(statement: &Statement) -> String {
    let taken: HashSet<&str> = statement
        .walk()
        .filter_map(|node| node.as_source().and_then(TableSource::alias))
        .collect();

    if !taken.contains(SYNTHETIC_ALIAS) {
        return SYNTHETIC_ALIAS.to_string();
    }
    let mut suffix = 1;
    loop {
        let candidate = format!("{SYNTHETIC_ALIAS}{suffix}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn rewrite_delete(
    delete: DeleteStatement,
    target: Target,
    alias: &str,
    ids: &mut IdGenerator,
) -> Result<Statement> {
    let source = new_target_source(&target, alias, ids);
    let source_id = source.id;
    let filter = correlated_filter(delete.query, &target, source_id);

    let mut query = SelectQuery::new(ids.next_query_id());
    query.from.push(source);
    query.where_clause = Some(Expression::exists(filter));

    trace!(target = %target.id, alias, "rewrote multi-table DELETE");
    Ok(Statement::Delete(Box::new(DeleteStatement {
        target: Some(source_id),
        query,
    })))
}

fn rewrite_update(
    update: UpdateStatement,
    target: Target,
    alias: &str,
    ids: &mut IdGenerator,
) -> Result<Statement> {
    let source = new_target_source(&target, alias, ids);
    let source_id = source.id;

    let scope = Scope::of(&update.query);
    let mut items = update.items;
    for item in &mut items {
        let value = std::mem::take(&mut item.expression);
        item.expression = if scope.reads_only(&value, target.id) {
            let mut map = IdMap::default();
            map.sources.insert(target.id, source_id);
            rewrite_expression(value, &mut map)?
        } else {
            trace!(column = %item.column, "moving set value into correlated subquery");
            correlated_value(&update.query, value, &target, source_id, ids)?
        };
    }

    let filter = correlated_filter(update.query, &target, source_id);
    let mut query = SelectQuery::new(ids.next_query_id());
    query.from.push(source);
    query.where_clause = Some(Expression::exists(filter));

    trace!(target = %target.id, alias, "rewrote multi-table UPDATE");
    Ok(Statement::Update(Box::new(UpdateStatement {
        target: Some(source_id),
        items,
        query,
    })))
}

fn new_target_source(target: &Target, alias: &str, ids: &mut IdGenerator) -> TableSource {
    let mut source = TableSource::new(
        ids.next_source_id(),
        SourceOrigin::Table(target.table.clone()),
    );
    source.assign_alias(alias);
    source
}

/// `inner.k1 = outer.k1 AND inner.k2 = outer.k2 ...` over the table's keys.
///
/// Nullable keys, which a keyless table falls back to, also match when both
/// sides are NULL.
fn key_equality(table: &TableRef, inner: SourceId, outer: SourceId) -> Option<Expression> {
    let field = |source: SourceId, name: &str| {
        let def = table.field(name);
        Expression::Field(crate::expressions::FieldRef {
            source,
            name: name.to_string(),
            data_type: def.map(|d| d.data_type).unwrap_or_default(),
            nullable: def.map(|d| d.nullable).unwrap_or(true),
        })
    };

    table
        .key_fields()
        .into_iter()
        .map(|key| Expression::null_safe_eq(field(inner, &key.name), field(outer, &key.name)))
        .reduce(Expression::and)
}

/// The original query as the body of `EXISTS`, tied to the new target row.
fn correlated_filter(mut query: SelectQuery, target: &Target, outer: SourceId) -> SelectQuery {
    query.select.columns = vec![Column::new(Expression::int(1))];
    if let Some(condition) = key_equality(&target.table, target.id, outer) {
        query.add_where(condition);
    }
    query
}

/// `(SELECT value FROM <copy of query> WHERE ... AND copy_target.key = $.key)`
fn correlated_value(
    query: &SelectQuery,
    value: Expression,
    target: &Target,
    outer: SourceId,
    ids: &mut IdGenerator,
) -> Result<Expression> {
    let mut renumber = Renumber {
        ids,
        map: IdMap::default(),
    };
    let copy = rewrite_query(query.clone(), &mut renumber)?;
    let mut map = renumber.map;

    let mut copy = rewrite_query(copy, &mut map)?;
    let value = rewrite_expression(value, &mut map)?;
    let copy_target = map.sources.get(&target.id).copied().unwrap_or(target.id);

    copy.select.columns = vec![Column::new(value)];
    copy.order_by.clear();
    if let Some(condition) = key_equality(&target.table, copy_target, outer) {
        copy.add_where(condition);
    }
    Ok(Expression::Subquery(Box::new(copy)))
}

/// Sources and derived queries declared directly in the DML query.
struct Scope {
    sources: HashSet<SourceId>,
    queries: HashSet<QueryId>,
}

impl Scope {
    fn of(query: &SelectQuery) -> Self {
        let declared = query.sources();
        Self {
            sources: declared.iter().map(|s| s.id).collect(),
            queries: declared
                .iter()
                .filter_map(|s| match &s.origin {
                    SourceOrigin::Query(q) => Some(q.id),
                    SourceOrigin::Table(_) => None,
                })
                .collect(),
        }
    }

    /// Whether `expr` reads no source of this scope other than `target`.
    fn reads_only(&self, expr: &Expression, target: SourceId) -> bool {
        !expr.contains(|node| match node {
            Node::Expression(Expression::Field(f)) => {
                f.source != target && self.sources.contains(&f.source)
            }
            Node::Expression(Expression::ColumnRef(c)) => self.queries.contains(&c.query),
            _ => false,
        })
    }
}

/// Old-to-new id mapping, applied to field and column references.
#[derive(Debug, Default)]
struct IdMap {
    sources: HashMap<SourceId, SourceId>,
    queries: HashMap<QueryId, QueryId>,
}

impl Rewriter for IdMap {
    fn leave_expression(&mut self, expr: Expression) -> Result<Expression> {
        Ok(match expr {
            Expression::Field(mut field) => {
                if let Some(id) = self.sources.get(&field.source) {
                    field.source = *id;
                }
                Expression::Field(field)
            }
            Expression::ColumnRef(mut column) => {
                if let Some(id) = self.queries.get(&column.query) {
                    column.query = *id;
                }
                Expression::ColumnRef(column)
            }
            other => other,
        })
    }
}

/// Gives every query and source of a copied subtree a fresh id and records
/// the mapping. References are fixed up afterwards with the resulting
/// [`IdMap`], since a reference can precede its declaration in walk order.
struct Renumber<'a> {
    ids: &'a mut IdGenerator,
    map: IdMap,
}

impl Renumber<'_> {
    fn renumber_source(&mut self, source: &mut TableSource) {
        let id = self.ids.next_source_id();
        self.map.sources.insert(source.id, id);
        source.id = id;
        for join in &mut source.joins {
            self.renumber_source(&mut join.source);
        }
    }
}

impl Rewriter for Renumber<'_> {
    fn enter_query(&mut self, mut query: SelectQuery) -> Result<Step<SelectQuery>> {
        let id = self.ids.next_query_id();
        self.map.queries.insert(query.id, id);
        query.id = id;
        for source in &mut query.from {
            self.renumber_source(source);
        }
        Ok(Step::Descend(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{table_ref, IrBuilder};
    use crate::expressions::{DataType, FieldDef, JoinKind, SetItem, IS_NULL_TEMPLATE};

    fn orders() -> TableRef {
        table_ref("orders")
            .with_field(FieldDef::new("id", DataType::Int32).primary_key(0))
            .with_field(FieldDef::new("customer_id", DataType::Int32))
            .with_field(FieldDef::new("total", DataType::Decimal))
    }

    fn customers() -> TableRef {
        table_ref("customers")
            .with_field(FieldDef::new("id", DataType::Int32).primary_key(0))
            .with_field(FieldDef::new("blocked", DataType::Boolean))
            .with_field(FieldDef::new("discount", DataType::Decimal))
    }

    /// DELETE o FROM orders o JOIN customers c ON o.customer_id = c.id WHERE c.blocked
    fn joined_delete(b: &mut IrBuilder) -> Statement {
        let o = b.table(orders(), "o");
        let c = b.table(customers(), "c");
        let on = Expression::eq(o.field("customer_id"), c.field("id"));
        let blocked = c.field("blocked");
        let target = o.id;
        let query = b
            .select()
            .from(o.join(JoinKind::Inner, c, on))
            .where_(blocked)
            .build();
        b.delete(Some(target), query)
    }

    #[test]
    fn test_single_table_delete_untouched() {
        let mut b = IrBuilder::new();
        let o = b.table(orders(), "o");
        let filter = Expression::eq(o.field("id"), Expression::int(1));
        let query = b.select().from(o).where_(filter).build();
        let before = b.delete(None, query);
        assert_eq!(rewrite_dml(before.clone()).unwrap(), before);
    }

    #[test]
    fn test_joined_delete_becomes_exists() {
        let mut b = IrBuilder::new();
        let result = rewrite_dml(joined_delete(&mut b)).unwrap();

        let Statement::Delete(delete) = &result else {
            panic!("expected DELETE");
        };
        assert_eq!(delete.query.from.len(), 1);
        let source = &delete.query.from[0];
        assert!(source.joins.is_empty());
        assert_eq!(source.alias(), Some(SYNTHETIC_ALIAS));
        assert_eq!(delete.target, Some(source.id));

        let Some(Expression::Exists(filter)) = &delete.query.where_clause else {
            panic!("expected EXISTS filter");
        };
        // The original join is preserved inside the subquery
        assert_eq!(filter.from[0].joins.len(), 1);
        assert!(filter.referenced_sources().contains(&source.id));
    }

    #[test]
    fn test_alias_suffix_when_taken() {
        let mut b = IrBuilder::new();
        let o = b.table(orders(), SYNTHETIC_ALIAS);
        let c = b.table(customers(), "c");
        let on = Expression::eq(o.field("customer_id"), c.field("id"));
        let query = b.select().from(o.join(JoinKind::Inner, c, on)).build();
        let statement = b.delete(None, query);

        let result = rewrite_dml(statement).unwrap();
        let query = result.select_query().unwrap();
        assert_eq!(query.from[0].alias(), Some("$1"));
    }

    #[test]
    fn test_target_without_fields_untouched() {
        let mut b = IrBuilder::new();
        let o = b.table(table_ref("orders"), "o");
        let c = b.table(customers(), "c");
        let on = Expression::eq(o.field("customer_id"), c.field("id"));
        let query = b.select().from(o.join(JoinKind::Inner, c, on)).build();
        let before = b.delete(None, query);
        assert_eq!(rewrite_dml(before.clone()).unwrap(), before);
    }

    #[test]
    fn test_nullable_keys_compared_null_safe() {
        let log = table_ref("log")
            .with_field(FieldDef::new("customer_id", DataType::Int32).not_null())
            .with_field(FieldDef::new("note", DataType::NVarChar));
        let mut b = IrBuilder::new();
        let l = b.table(log, "l");
        let c = b.table(customers(), "c");
        let on = Expression::eq(l.field("customer_id"), c.field("id"));
        let query = b.select().from(l.join(JoinKind::Inner, c, on)).build();

        let result = rewrite_dml(b.delete(None, query)).unwrap();
        let query = result.select_query().unwrap();
        let Some(Expression::Exists(filter)) = &query.where_clause else {
            panic!("expected EXISTS filter");
        };
        let is_null = |n: &Node<'_>| {
            matches!(n, Node::Expression(Expression::Raw(r)) if r.format == IS_NULL_TEMPLATE)
        };
        // Both sides of `note` are tested, `customer_id` is a plain equality
        assert_eq!(filter.count(is_null), 2);
    }

    #[test]
    fn test_update_values_split_by_dependency() {
        let mut b = IrBuilder::new();
        let o = b.table(orders(), "o");
        let c = b.table(customers(), "c");
        let on = Expression::eq(o.field("customer_id"), c.field("id"));
        let target = o.id;
        let own = Expression::binary(
            o.field("total"),
            crate::expressions::BinaryOperator::Add,
            Expression::int(1),
            DataType::Decimal,
        );
        let other = c.field("discount");
        let query = b.select().from(o.join(JoinKind::Inner, c, on)).build();
        let statement = b.update(
            Some(target),
            vec![SetItem::new("total", own), SetItem::new("discount", other)],
            query,
        );

        let result = rewrite_dml(statement).unwrap();
        let Statement::Update(update) = &result else {
            panic!("expected UPDATE");
        };
        let new_target = update.target.unwrap();

        assert_eq!(update.items[0].expression.referenced_sources(), vec![new_target]);
        assert!(matches!(update.items[1].expression, Expression::Subquery(_)));

        // Every query and source id in the result is unique
        let mut queries = result.query_ids();
        let count = queries.len();
        queries.sort();
        queries.dedup();
        assert_eq!(queries.len(), count);

        let mut sources = result.source_ids();
        let count = sources.len();
        sources.sort();
        sources.dedup();
        assert_eq!(sources.len(), count);
    }

    #[test]
    fn test_target_not_first_source_is_rewritten() {
        let mut b = IrBuilder::new();
        let c = b.table(customers(), "c");
        let o = b.table(orders(), "o");
        let target = o.id;
        let query = b.select().from(c).from(o).build();
        let statement = b.delete(Some(target), query);

        let result = rewrite_dml(statement).unwrap();
        let query = result.select_query().unwrap();
        assert_eq!(query.from.len(), 1);
        assert_eq!(query.from[0].table().map(|t| t.name.as_str()), Some("orders"));
    }
}
