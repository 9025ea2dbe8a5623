//! Read-only traversal of statement trees.
//!
//! The statement IR is made of several node kinds (statements, queries,
//! sources, columns, expressions, ...). [`Node`] is a borrowed view over any
//! of them, and [`Node::children`] lists the direct children of a node in
//! clause order. On top of that this module provides:
//!
//! - [`DfsIter`] -- pre-order traversal using a stack. Every reachable node is
//!   yielded exactly once, parent before children.
//! - [`visit`] -- the same traversal driven by a callback.
//! - The [`TreeWalk`] extension trait with [`find_all`](TreeWalk::find_all),
//!   [`contains`](TreeWalk::contains) and [`count`](TreeWalk::count).
//!
//! Nothing here mutates the tree; structural edits go through
//! [`crate::rewrite`].

use crate::expressions::{
    Column, Expression, Join, MergeOperation, OrderByItem, Parameter, QueryId, SelectQuery,
    SetItem, SourceId, SourceOrigin, Statement, TableRef, TableSource,
};

/// Borrowed view of one node of a statement tree.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Statement(&'a Statement),
    Query(&'a SelectQuery),
    Column(&'a Column),
    Source(&'a TableSource),
    Join(&'a Join),
    Table(&'a TableRef),
    OrderBy(&'a OrderByItem),
    SetItem(&'a SetItem),
    MergeOperation(&'a MergeOperation),
    Expression(&'a Expression),
}

impl<'a> Node<'a> {
    /// Direct children of this node, in clause order.
    pub fn children(&self) -> Vec<Node<'a>> {
        let mut children = Vec::new();

        match *self {
            Node::Statement(statement) => match statement {
                Statement::Select(s) => children.push(Node::Query(&s.query)),
                Statement::Insert(s) => {
                    children.push(Node::Table(&s.into));
                    children.extend(s.items.iter().map(Node::SetItem));
                    children.push(Node::Query(&s.query));
                }
                Statement::Update(s) => {
                    children.extend(s.items.iter().map(Node::SetItem));
                    children.push(Node::Query(&s.query));
                }
                Statement::Delete(s) => children.push(Node::Query(&s.query)),
                Statement::Merge(s) => {
                    children.push(Node::Source(&s.target));
                    children.push(Node::Query(&s.source));
                    if let Some(on) = &s.on {
                        children.push(Node::Expression(on));
                    }
                    children.extend(s.operations.iter().map(Node::MergeOperation));
                }
                Statement::CreateTable(s) => children.push(Node::Table(&s.table)),
                Statement::DropTable(s) => children.push(Node::Table(&s.table)),
            },
            Node::Query(query) => {
                children.extend(query.select.columns.iter().map(Node::Column));
                if let Some(skip) = &query.select.skip {
                    children.push(Node::Expression(skip));
                }
                if let Some(take) = &query.select.take {
                    children.push(Node::Expression(take));
                }
                children.extend(query.from.iter().map(Node::Source));
                if let Some(where_clause) = &query.where_clause {
                    children.push(Node::Expression(where_clause));
                }
                children.extend(query.group_by.iter().map(Node::Expression));
                if let Some(having) = &query.having {
                    children.push(Node::Expression(having));
                }
                children.extend(query.order_by.iter().map(Node::OrderBy));
            }
            Node::Column(column) => children.push(Node::Expression(&column.expression)),
            Node::Source(source) => {
                match &source.origin {
                    SourceOrigin::Table(table) => children.push(Node::Table(table)),
                    SourceOrigin::Query(query) => children.push(Node::Query(query)),
                }
                children.extend(source.joins.iter().map(Node::Join));
            }
            Node::Join(join) => {
                children.push(Node::Source(&join.source));
                if let Some(condition) = &join.condition {
                    children.push(Node::Expression(condition));
                }
            }
            Node::Table(_) => {}
            Node::OrderBy(item) => children.push(Node::Expression(&item.expression)),
            Node::SetItem(item) => children.push(Node::Expression(&item.expression)),
            Node::MergeOperation(operation) => {
                if let Some(condition) = &operation.condition {
                    children.push(Node::Expression(condition));
                }
                children.extend(operation.items.iter().map(Node::SetItem));
            }
            Node::Expression(expr) => match expr {
                Expression::Function(f) => children.extend(f.args.iter().map(Node::Expression)),
                Expression::BinaryOp(b) => {
                    children.push(Node::Expression(&b.left));
                    children.push(Node::Expression(&b.right));
                }
                Expression::Raw(r) => children.extend(r.args.iter().map(Node::Expression)),
                Expression::Subquery(q) | Expression::Exists(q) => children.push(Node::Query(q)),
                Expression::Value(_)
                | Expression::Parameter(_)
                | Expression::Field(_)
                | Expression::ColumnRef(_)
                | Expression::DataType(_) => {}
            },
        }

        children
    }

    pub fn as_expression(&self) -> Option<&'a Expression> {
        match *self {
            Node::Expression(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_query(&self) -> Option<&'a SelectQuery> {
        match *self {
            Node::Query(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_source(&self) -> Option<&'a TableSource> {
        match *self {
            Node::Source(s) => Some(s),
            _ => None,
        }
    }
}

/// Pre-order depth-first iterator over a statement tree.
///
/// The root is yielded first, then each child subtree from left to right.
/// Created via [`TreeWalk::walk`] or [`DfsIter::new`].
pub struct DfsIter<'a> {
    stack: Vec<Node<'a>>,
}

impl<'a> DfsIter<'a> {
    pub fn new(root: Node<'a>) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for DfsIter<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;

        // Push in reverse so children come out in forward order
        self.stack.extend(node.children().into_iter().rev());

        Some(node)
    }
}

/// Invoke `callback` on every node reachable from `root`, parent first.
pub fn visit<'a, F>(root: Node<'a>, mut callback: F)
where
    F: FnMut(Node<'a>),
{
    for node in DfsIter::new(root) {
        callback(node);
    }
}

/// Extension trait adding traversal and search methods to tree roots.
pub trait TreeWalk {
    fn as_node(&self) -> Node<'_>;

    /// Pre-order iterator over this node and all descendants.
    fn walk(&self) -> DfsIter<'_> {
        DfsIter::new(self.as_node())
    }

    /// Collects all nodes matching `predicate` in pre-order.
    fn find_all<F>(&self, predicate: F) -> Vec<Node<'_>>
    where
        F: Fn(&Node<'_>) -> bool,
    {
        self.walk().filter(|n| predicate(n)).collect()
    }

    /// Returns `true` if this node or any descendant matches `predicate`.
    fn contains<F>(&self, predicate: F) -> bool
    where
        F: Fn(&Node<'_>) -> bool,
    {
        self.walk().any(|n| predicate(&n))
    }

    /// Counts how many nodes (including this one) match `predicate`.
    fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Node<'_>) -> bool,
    {
        self.walk().filter(|n| predicate(n)).count()
    }

    /// All parameters reachable from this node.
    fn parameters(&self) -> Vec<&Parameter> {
        self.walk()
            .filter_map(|n| match n {
                Node::Expression(Expression::Parameter(p)) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Ids of every table source declared at or below this node.
    fn source_ids(&self) -> Vec<SourceId> {
        self.walk()
            .filter_map(|n| n.as_source().map(|s| s.id))
            .collect()
    }

    /// Ids of every query at or below this node.
    fn query_ids(&self) -> Vec<QueryId> {
        self.walk()
            .filter_map(|n| n.as_query().map(|q| q.id))
            .collect()
    }

    /// Ids of every table source referenced by a field below this node.
    fn referenced_sources(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self
            .walk()
            .filter_map(|n| match n {
                Node::Expression(Expression::Field(f)) => Some(f.source),
                _ => None,
            })
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl TreeWalk for Statement {
    fn as_node(&self) -> Node<'_> {
        Node::Statement(self)
    }
}

impl TreeWalk for SelectQuery {
    fn as_node(&self) -> Node<'_> {
        Node::Query(self)
    }
}

impl TreeWalk for TableSource {
    fn as_node(&self) -> Node<'_> {
        Node::Source(self)
    }
}

impl TreeWalk for Expression {
    fn as_node(&self) -> Node<'_> {
        Node::Expression(self)
    }
}

/// Returns `true` if the node is an expression that reads a table field or a
/// nested query column.
pub fn is_column_reference(node: &Node<'_>) -> bool {
    matches!(
        node,
        Node::Expression(Expression::Field(_)) | Node::Expression(Expression::ColumnRef(_))
    )
}

/// Returns `true` if the node is a bound parameter.
pub fn is_bound_parameter(node: &Node<'_>) -> bool {
    matches!(node, Node::Expression(Expression::Parameter(p)) if p.is_bound())
}

/// Returns `true` if the node is a function call named `name`.
pub fn is_function_named(node: &Node<'_>, name: &str) -> bool {
    matches!(node, Node::Expression(Expression::Function(f)) if f.is(name))
}
