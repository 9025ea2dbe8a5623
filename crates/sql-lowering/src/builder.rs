//! Statement Builder API
//!
//! Provides a programmatic way to construct statement trees. The host
//! language compiler normally produces the IR; this module is the surface
//! used by callers that build statements by hand, by the tests, and by the
//! optimizer passes that need fresh ids.
//!
//! # Design
//!
//! - **[`IdGenerator`]** hands out [`QueryId`]s and [`SourceId`]s that are
//!   unique within one tree. [`IdGenerator::after`] continues numbering past
//!   the highest id already present, which is how passes allocate ids for
//!   the nodes they create.
//! - **[`IrBuilder`]** wraps a generator and creates table sources
//!   ([`IrBuilder::table`], [`IrBuilder::derived`]) and queries
//!   ([`IrBuilder::select`] returning a fluent [`QueryBuilder`]).
//! - **Statement starters** ([`IrBuilder::insert_into`], [`IrBuilder::update`],
//!   [`IrBuilder::delete`]) wrap a finished query into a statement.
//!
//! # Examples
//!
//! ```
//! use sql_lowering::builder::*;
//! use sql_lowering::expressions::*;
//!
//! // SELECT p.name FROM people p WHERE p.id = 1 ORDER BY p.name
//! let mut b = IrBuilder::new();
//! let people = b.table(table_ref("dbo.people"), "p");
//! let name = people.field("name");
//! let id = people.field("id");
//! let query = b
//!     .select()
//!     .column(name.clone())
//!     .from(people)
//!     .where_(Expression::eq(id, Expression::int(1)))
//!     .order_by(name)
//!     .build();
//! assert_eq!(query.from.len(), 1);
//! ```

use crate::expressions::*;
use crate::traversal::{Node, TreeWalk};

/// Split a dotted name into a [`TableRef`].
///
/// `server.database.schema.table`, `database.schema.table`, `schema.table`
/// and `table` are accepted; extra leading parts are ignored.
pub fn table_ref(name: &str) -> TableRef {
    let parts: Vec<&str> = name.split('.').collect();
    let mut parts = parts.into_iter().rev();

    let mut table = TableRef::new(parts.next().unwrap_or(""));
    table.schema = parts.next().map(str::to_string);
    table.database = parts.next().map(str::to_string);
    table.server = parts.next().map(str::to_string);
    table
}

// ---------------------------------------------------------------------------
// Id allocation
// ---------------------------------------------------------------------------

/// Allocates query and source ids unique within one tree.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    next_query: u32,
    next_source: u32,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    /// Start numbering at 1.
    pub fn new() -> Self {
        Self {
            next_query: 1,
            next_source: 1,
        }
    }

    /// Continue numbering after the highest id present in `root`.
    pub fn after<T: TreeWalk + ?Sized>(root: &T) -> Self {
        let mut generator = Self::new();
        generator.reserve(root);
        generator
    }

    /// Make sure no id present in `root` is handed out later.
    pub fn reserve<T: TreeWalk + ?Sized>(&mut self, root: &T) {
        for node in root.walk() {
            match node {
                Node::Query(query) => {
                    self.next_query = self.next_query.max(query.id.0.saturating_add(1));
                }
                Node::Source(source) => {
                    self.next_source = self.next_source.max(source.id.0.saturating_add(1));
                }
                _ => {}
            }
        }
    }

    pub fn next_query_id(&mut self) -> QueryId {
        let id = QueryId(self.next_query);
        self.next_query += 1;
        id
    }

    pub fn next_source_id(&mut self) -> SourceId {
        let id = SourceId(self.next_source);
        self.next_source += 1;
        id
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Entry point for building one statement tree.
#[derive(Debug, Clone, Default)]
pub struct IrBuilder {
    ids: IdGenerator,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the underlying id generator.
    pub fn ids(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    /// A base table source with the given alias.
    pub fn table(&mut self, table: TableRef, alias: &str) -> TableSource {
        TableSource::new(self.ids.next_source_id(), SourceOrigin::Table(table)).with_alias(alias)
    }

    /// A derived table source over `query`.
    pub fn derived(&mut self, query: SelectQuery, alias: &str) -> TableSource {
        TableSource::new(
            self.ids.next_source_id(),
            SourceOrigin::Query(Box::new(query)),
        )
        .with_alias(alias)
    }

    /// Start a query with a fresh id.
    pub fn select(&mut self) -> QueryBuilder {
        QueryBuilder {
            query: SelectQuery::new(self.ids.next_query_id()),
        }
    }

    /// `INSERT INTO into (items...)` with an empty feeding query.
    pub fn insert_into(&mut self, into: TableRef, items: Vec<SetItem>) -> Statement {
        let query = SelectQuery::new(self.ids.next_query_id());
        Statement::Insert(Box::new(InsertStatement { into, items, query }))
    }

    /// `INSERT INTO into SELECT ...`.
    pub fn insert_select(&mut self, into: TableRef, query: SelectQuery) -> Statement {
        Statement::Insert(Box::new(InsertStatement {
            into,
            items: Vec::new(),
            query,
        }))
    }

    /// `UPDATE target SET items FROM query`.
    pub fn update(
        &mut self,
        target: Option<SourceId>,
        items: Vec<SetItem>,
        query: SelectQuery,
    ) -> Statement {
        Statement::Update(Box::new(UpdateStatement {
            target,
            items,
            query,
        }))
    }

    /// `DELETE target FROM query`.
    pub fn delete(&mut self, target: Option<SourceId>, query: SelectQuery) -> Statement {
        Statement::Delete(Box::new(DeleteStatement { target, query }))
    }
}

/// Fluent builder for one [`SelectQuery`].
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: SelectQuery,
}

impl QueryBuilder {
    pub fn id(&self) -> QueryId {
        self.query.id
    }

    pub fn column(mut self, expression: Expression) -> Self {
        self.query.add_column(expression);
        self
    }

    pub fn column_as(mut self, expression: Expression, alias: &str) -> Self {
        self.query
            .select
            .columns
            .push(Column::new(expression).with_alias(alias));
        self
    }

    pub fn columns<I>(mut self, expressions: I) -> Self
    where
        I: IntoIterator<Item = Expression>,
    {
        for expression in expressions {
            self.query.add_column(expression);
        }
        self
    }

    pub fn distinct(mut self) -> Self {
        self.query.select.distinct = true;
        self
    }

    pub fn from(mut self, source: TableSource) -> Self {
        self.query.from.push(source);
        self
    }

    /// Add a condition, combined with any existing one using AND.
    pub fn where_(mut self, condition: Expression) -> Self {
        self.query.add_where(condition);
        self
    }

    pub fn group_by(mut self, expression: Expression) -> Self {
        self.query.group_by.push(expression);
        self
    }

    pub fn having(mut self, condition: Expression) -> Self {
        self.query.having = Some(condition);
        self
    }

    pub fn order_by(mut self, expression: Expression) -> Self {
        self.query.order_by_asc(expression);
        self
    }

    pub fn order_by_desc(mut self, expression: Expression) -> Self {
        self.query.order_by.push(OrderByItem::desc(expression));
        self
    }

    pub fn skip(mut self, rows: Expression) -> Self {
        self.query.select.skip = Some(rows);
        self
    }

    pub fn take(mut self, rows: Expression) -> Self {
        self.query.select.take = Some(rows);
        self
    }

    pub fn build(self) -> SelectQuery {
        self.query
    }
}
