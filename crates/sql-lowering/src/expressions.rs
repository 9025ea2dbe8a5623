//! Statement IR.
//!
//! This module defines the node types of one SQL statement tree as it flows
//! from the IR builder, through the optimizer passes, to the SQL renderer.
//!
//! # Architecture
//!
//! The root is [`Statement`], a closed enum with one variant per statement
//! kind. Every DML variant owns exactly one [`SelectQuery`], which in turn
//! owns its projection ([`SelectClause`]), its sources ([`TableSource`]) and
//! its filter/grouping/ordering clauses. Scalar positions hold an
//! [`Expression`], itself a closed enum over the node kinds the passes know
//! how to handle.
//!
//! | Group | Types | Purpose |
//! |---|---|---|
//! | **Statements** | `Statement`, `InsertStatement`, `DeleteStatement`, ... | Root payloads |
//! | **Queries** | `SelectQuery`, `SelectClause`, `Column`, `OrderByItem` | One query scope |
//! | **Sources** | `TableSource`, `SourceOrigin`, `Join`, `TableRef`, `FieldDef` | FROM clause |
//! | **Expressions** | `Expression`, `Function`, `BinaryOp`, `RawTemplate`, `Parameter` | Scalar nodes |
//! | **Types** | `DataType`, `Literal`, `SqlValue` | Values and their static types |
//!
//! # Ownership
//!
//! A tree owns all of its nodes; nothing is reference counted, so a node can
//! never be reachable from two trees. Cross-references inside a tree (a field
//! of a table source, a column of a nested query) are expressed with the
//! [`SourceId`] and [`QueryId`] handles rather than pointers.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a [`SelectQuery`] inside one statement tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct QueryId(pub u32);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query #{}", self.0)
    }
}

/// Identifies a [`TableSource`] inside one statement tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source #{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// Statement kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    CreateTable,
    DropTable,
}

/// Root of a statement tree.
///
/// The [`QueryType`] of a statement is derived from its variant, so the tag
/// and the payload shape can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    Select(Box<SelectStatement>),
    Insert(Box<InsertStatement>),
    Update(Box<UpdateStatement>),
    Delete(Box<DeleteStatement>),
    Merge(Box<MergeStatement>),
    CreateTable(Box<CreateTableStatement>),
    DropTable(Box<DropTableStatement>),
}

impl Statement {
    pub fn query_type(&self) -> QueryType {
        match self {
            Statement::Select(_) => QueryType::Select,
            Statement::Insert(_) => QueryType::Insert,
            Statement::Update(_) => QueryType::Update,
            Statement::Delete(_) => QueryType::Delete,
            Statement::Merge(_) => QueryType::Merge,
            Statement::CreateTable(_) => QueryType::CreateTable,
            Statement::DropTable(_) => QueryType::DropTable,
        }
    }

    /// The query owned by this statement, if the statement kind carries one.
    pub fn select_query(&self) -> Option<&SelectQuery> {
        match self {
            Statement::Select(s) => Some(&s.query),
            Statement::Insert(s) => Some(&s.query),
            Statement::Update(s) => Some(&s.query),
            Statement::Delete(s) => Some(&s.query),
            Statement::Merge(s) => Some(&s.source),
            Statement::CreateTable(_) | Statement::DropTable(_) => None,
        }
    }

    pub fn select_query_mut(&mut self) -> Option<&mut SelectQuery> {
        match self {
            Statement::Select(s) => Some(&mut s.query),
            Statement::Insert(s) => Some(&mut s.query),
            Statement::Update(s) => Some(&mut s.query),
            Statement::Delete(s) => Some(&mut s.query),
            Statement::Merge(s) => Some(&mut s.source),
            Statement::CreateTable(_) | Statement::DropTable(_) => None,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Statement::Insert(_))
    }
}

impl From<SelectQuery> for Statement {
    fn from(query: SelectQuery) -> Self {
        Statement::Select(Box::new(SelectStatement { query }))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectStatement {
    pub query: SelectQuery,
}

/// `INSERT INTO table (items...)` fed either by the set items or by the
/// projected columns of `query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertStatement {
    pub into: TableRef,
    #[serde(default)]
    pub items: Vec<SetItem>,
    pub query: SelectQuery,
}

/// `UPDATE target SET items... FROM query.from WHERE query.where_clause`.
///
/// `target` names the table source being updated; `None` means the first
/// source of the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatement {
    #[serde(default)]
    pub target: Option<SourceId>,
    pub items: Vec<SetItem>,
    pub query: SelectQuery,
}

/// `DELETE target FROM query.from WHERE query.where_clause`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStatement {
    #[serde(default)]
    pub target: Option<SourceId>,
    pub query: SelectQuery,
}

/// `MERGE INTO target USING source ON on WHEN ...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeStatement {
    pub target: TableSource,
    pub source: SelectQuery,
    #[serde(default)]
    pub on: Option<Expression>,
    pub operations: Vec<MergeOperation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOperationKind {
    /// `WHEN MATCHED THEN UPDATE`
    Update,
    /// `WHEN MATCHED THEN DELETE`
    Delete,
    /// `WHEN NOT MATCHED THEN INSERT`
    Insert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOperation {
    pub kind: MergeOperationKind,
    #[serde(default)]
    pub condition: Option<Expression>,
    #[serde(default)]
    pub items: Vec<SetItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTableStatement {
    pub table: TableRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTableStatement {
    pub table: TableRef,
    #[serde(default)]
    pub if_exists: bool,
}

/// One `column = expression` assignment of an INSERT, UPDATE or MERGE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetItem {
    pub column: String,
    pub expression: Expression,
}

impl SetItem {
    pub fn new(column: impl Into<String>, expression: Expression) -> Self {
        Self {
            column: column.into(),
            expression,
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// One query scope: projection, sources, filter, grouping and ordering.
///
/// A `SelectQuery` can be the body of a statement, the origin of a
/// [`TableSource`] (derived table) or the operand of an
/// [`Expression::Subquery`] / [`Expression::Exists`]. Expressions inside it
/// may reference sources of this scope or of any enclosing scope.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectQuery {
    pub id: QueryId,
    #[serde(default)]
    pub select: SelectClause,
    #[serde(default)]
    pub from: Vec<TableSource>,
    #[serde(default)]
    pub where_clause: Option<Expression>,
    #[serde(default)]
    pub group_by: Vec<Expression>,
    #[serde(default)]
    pub having: Option<Expression>,
    #[serde(default)]
    pub order_by: Vec<OrderByItem>,
}

impl SelectQuery {
    pub fn new(id: QueryId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Append a projected column and return its position.
    pub fn add_column(&mut self, expression: Expression) -> usize {
        self.select.columns.push(Column::new(expression));
        self.select.columns.len() - 1
    }

    pub fn order_by_asc(&mut self, expression: Expression) {
        self.order_by.push(OrderByItem::asc(expression));
    }

    /// Add a condition to WHERE, combining with an existing filter using AND.
    pub fn add_where(&mut self, condition: Expression) {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => Expression::and(existing, condition),
            None => condition,
        });
    }

    /// Whether this query has a row-skipping bound.
    pub fn has_skip(&self) -> bool {
        self.select.skip.is_some()
    }

    /// All table sources of this scope: FROM entries and their (nested) joins,
    /// in declaration order. Derived tables are not entered.
    pub fn sources(&self) -> Vec<&TableSource> {
        fn collect<'a>(source: &'a TableSource, out: &mut Vec<&'a TableSource>) {
            out.push(source);
            for join in &source.joins {
                collect(&join.source, out);
            }
        }

        let mut out = Vec::new();
        for source in &self.from {
            collect(source, &mut out);
        }
        out
    }

    pub fn find_source(&self, id: SourceId) -> Option<&TableSource> {
        self.sources().into_iter().find(|s| s.id == id)
    }

    /// Whether the FROM clause joins more than one source.
    pub fn is_multi_table(&self) -> bool {
        self.from.len() > 1 || self.from.iter().any(|s| !s.joins.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectClause {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub distinct: bool,
    /// Number of leading rows to skip (`OFFSET`).
    #[serde(default)]
    pub skip: Option<Expression>,
    /// Maximum number of rows to return (`FETCH`/`TOP`).
    #[serde(default)]
    pub take: Option<Expression>,
}

/// A projected column. Its position in [`SelectClause::columns`] is stable
/// and is what [`ColumnRef::index`] points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub expression: Expression,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Column {
    pub fn new(expression: Expression) -> Self {
        Self {
            expression,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub expression: Expression,
    #[serde(default)]
    pub desc: bool,
}

impl OrderByItem {
    pub fn asc(expression: Expression) -> Self {
        Self {
            expression,
            desc: false,
        }
    }

    pub fn desc(expression: Expression) -> Self {
        Self {
            expression,
            desc: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// An entry of a FROM clause: a base table or a derived table, its alias and
/// the joins hanging off it.
///
/// Aliases are unique within one query scope. The alias is only changed
/// through the optimizer's alias-assignment step; the IR builder sets it at
/// construction time with [`TableSource::with_alias`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSource {
    pub id: SourceId,
    pub origin: SourceOrigin,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    pub joins: Vec<Join>,
}

impl TableSource {
    pub fn new(id: SourceId, origin: SourceOrigin) -> Self {
        Self {
            id,
            origin,
            alias: None,
            joins: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub(crate) fn assign_alias(&mut self, alias: impl Into<String>) {
        self.alias = Some(alias.into());
    }

    pub fn join(mut self, kind: JoinKind, source: TableSource, condition: Expression) -> Self {
        self.joins.push(Join {
            kind,
            source,
            condition: Some(condition),
        });
        self
    }

    pub fn table(&self) -> Option<&TableRef> {
        match &self.origin {
            SourceOrigin::Table(table) => Some(table),
            SourceOrigin::Query(_) => None,
        }
    }

    /// Reference a field of this source by name. The type comes from the
    /// table definition when the field is known there.
    pub fn field(&self, name: &str) -> Expression {
        let def = self.table().and_then(|t| t.field(name));
        Expression::Field(FieldRef {
            source: self.id,
            name: name.to_string(),
            data_type: def.map(|d| d.data_type).unwrap_or(DataType::Unknown),
            nullable: def.map(|d| d.nullable).unwrap_or(true),
        })
    }

    /// Expressions identifying a row of this source: the table's key fields,
    /// or every column of a derived table.
    pub fn key_expressions(&self) -> Vec<Expression> {
        match &self.origin {
            SourceOrigin::Table(table) => table
                .key_fields()
                .into_iter()
                .map(|def| {
                    Expression::Field(FieldRef {
                        source: self.id,
                        name: def.name.clone(),
                        data_type: def.data_type,
                        nullable: def.nullable,
                    })
                })
                .collect(),
            SourceOrigin::Query(query) => query
                .select
                .columns
                .iter()
                .enumerate()
                .map(|(index, column)| {
                    Expression::ColumnRef(ColumnRef {
                        query: query.id,
                        index,
                        data_type: column.expression.data_type(),
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    Table(TableRef),
    Query(Box<SelectQuery>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub source: TableSource,
    #[serde(default)]
    pub condition: Option<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    CrossApply,
    OuterApply,
}

/// A physical table: its (possibly qualified) name and known fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub temporary: bool,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Primary key fields in key order, or every field when no key is known.
    pub fn key_fields(&self) -> Vec<&FieldDef> {
        let mut keys: Vec<&FieldDef> = self
            .fields
            .iter()
            .filter(|f| f.primary_key.is_some())
            .collect();
        if keys.is_empty() {
            return self.fields.iter().collect();
        }
        keys.sort_by_key(|f| f.primary_key);
        keys
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub data_type: DataType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Ordinal within the primary key.
    #[serde(default)]
    pub primary_key: Option<u16>,
}

fn default_true() -> bool {
    true
}

impl FieldDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: None,
        }
    }

    pub fn primary_key(mut self, ordinal: u16) -> Self {
        self.primary_key = Some(ordinal);
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Operator precedence levels, highest binds tightest.
pub mod precedence {
    pub const PRIMARY: i32 = 100;
    pub const UNARY: i32 = 90;
    pub const MULTIPLICATIVE: i32 = 80;
    pub const SUBTRACTION: i32 = 70;
    pub const ADDITIVE: i32 = 60;
    pub const COMPARISON: i32 = 50;
    pub const BITWISE: i32 = 40;
    pub const LOGICAL_NEGATION: i32 = 30;
    pub const LOGICAL_CONJUNCTION: i32 = 20;
    pub const LOGICAL_DISJUNCTION: i32 = 10;
    pub const UNKNOWN: i32 = 0;
}

/// Format of the template built by [`Expression::is_null`].
pub const IS_NULL_TEMPLATE: &str = "{0} IS NULL";

/// A scalar node of the statement tree.
///
/// Adding a variant here is a compile-time exercise: the traversal, the
/// rewrite engine, the evaluator and the dialect conversions all match on it
/// exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// A typed literal.
    Value(SqlValue),
    /// A value supplied by the caller, bound or inlined.
    Parameter(Parameter),
    /// A field of a table source.
    Field(FieldRef),
    /// A projected column of a nested query.
    ColumnRef(ColumnRef),
    Function(Box<Function>),
    BinaryOp(Box<BinaryOp>),
    /// Engine text with `{n}` placeholders for `args`.
    Raw(Box<RawTemplate>),
    /// A type used as an argument, e.g. the target of `Convert`.
    DataType(DataType),
    /// Scalar subquery.
    Subquery(Box<SelectQuery>),
    /// `EXISTS (query)`.
    Exists(Box<SelectQuery>),
}

impl Default for Expression {
    fn default() -> Self {
        Expression::Value(SqlValue::null(DataType::Unknown))
    }
}

impl Expression {
    pub fn value(value: Literal, data_type: DataType) -> Self {
        Expression::Value(SqlValue { value, data_type })
    }

    /// A literal typed with the literal's natural type.
    pub fn literal(value: Literal) -> Self {
        let data_type = value.data_type();
        Expression::value(value, data_type)
    }

    pub fn int(value: i32) -> Self {
        Expression::value(Literal::Int(value as i64), DataType::Int32)
    }

    pub fn long(value: i64) -> Self {
        Expression::value(Literal::Int(value), DataType::Int64)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::value(Literal::String(value.into()), DataType::NVarChar)
    }

    pub fn null(data_type: DataType) -> Self {
        Expression::Value(SqlValue::null(data_type))
    }

    pub fn parameter(name: impl Into<String>, value: Literal, data_type: DataType) -> Self {
        Expression::Parameter(Parameter::new(name, value, data_type))
    }

    pub fn function(name: impl Into<String>, data_type: DataType, args: Vec<Expression>) -> Self {
        Expression::Function(Box::new(Function::new(name, data_type, args)))
    }

    pub fn binary(
        left: Expression,
        operator: BinaryOperator,
        right: Expression,
        data_type: DataType,
    ) -> Self {
        Expression::BinaryOp(Box::new(BinaryOp::new(left, operator, right, data_type)))
    }

    pub fn eq(left: Expression, right: Expression) -> Self {
        Expression::binary(left, BinaryOperator::Equal, right, DataType::Boolean)
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::binary(left, BinaryOperator::And, right, DataType::Boolean)
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::binary(left, BinaryOperator::Or, right, DataType::Boolean)
    }

    /// `value IS NULL`.
    pub fn is_null(value: Expression) -> Self {
        Expression::raw(
            IS_NULL_TEMPLATE,
            precedence::COMPARISON,
            vec![value],
            DataType::Boolean,
        )
    }

    /// `left = right`, also true when both sides are NULL.
    pub fn null_safe_eq(left: Expression, right: Expression) -> Self {
        if !left.can_be_null() || !right.can_be_null() {
            return Expression::eq(left, right);
        }
        let both_null = Expression::and(
            Expression::is_null(left.clone()),
            Expression::is_null(right.clone()),
        );
        Expression::or(Expression::eq(left, right), both_null)
    }

    pub fn raw(
        format: impl Into<String>,
        precedence: i32,
        args: Vec<Expression>,
        data_type: DataType,
    ) -> Self {
        Expression::Raw(Box::new(RawTemplate {
            format: format.into(),
            precedence,
            args,
            data_type,
        }))
    }

    /// `Convert(target, value)`, typed as `target`.
    pub fn convert(target: DataType, value: Expression) -> Self {
        Expression::function("Convert", target, vec![Expression::DataType(target), value])
    }

    pub fn exists(query: SelectQuery) -> Self {
        Expression::Exists(Box::new(query))
    }

    /// Static type of the value this expression produces.
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Value(v) => v.data_type,
            Expression::Parameter(p) => p.data_type,
            Expression::Field(f) => f.data_type,
            Expression::ColumnRef(c) => c.data_type,
            Expression::Function(f) => f.data_type,
            Expression::BinaryOp(b) => b.data_type,
            Expression::Raw(r) => r.data_type,
            Expression::DataType(t) => *t,
            Expression::Subquery(q) => q
                .select
                .columns
                .first()
                .map(|c| c.expression.data_type())
                .unwrap_or(DataType::Unknown),
            Expression::Exists(_) => DataType::Boolean,
        }
    }

    pub fn can_be_null(&self) -> bool {
        match self {
            Expression::Value(v) => v.value.is_null(),
            Expression::Parameter(_) => true,
            Expression::Field(f) => f.nullable,
            Expression::ColumnRef(_) => true,
            Expression::Function(f) => f.flags.nullable,
            Expression::BinaryOp(b) => b.nullable,
            Expression::Raw(_) => true,
            Expression::DataType(_) => false,
            Expression::Subquery(_) => true,
            Expression::Exists(_) => false,
        }
    }

    pub fn precedence(&self) -> i32 {
        match self {
            Expression::BinaryOp(b) => b.precedence,
            Expression::Raw(r) => r.precedence,
            _ => precedence::PRIMARY,
        }
    }

    pub fn as_parameter(&self) -> Option<&Parameter> {
        match self {
            Expression::Parameter(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Expression::Function(f) => Some(f),
            _ => None,
        }
    }
}

/// A literal together with the static type it is rendered as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlValue {
    pub value: Literal,
    pub data_type: DataType,
}

impl SqlValue {
    pub fn null(data_type: DataType) -> Self {
        Self {
            value: Literal::Null,
            data_type,
        }
    }
}

/// A caller-supplied value.
///
/// A bound parameter is sent to the driver as a placeholder; an unbound one
/// is written into the SQL text as a literal. Parameters start out bound and
/// are only switched to inline by the optimizer passes that detect an engine
/// limitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Literal,
    pub data_type: DataType,
    #[serde(default = "default_true")]
    is_bound: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Literal, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            value,
            data_type,
            is_bound: true,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.is_bound
    }

    /// Render this parameter inline instead of binding it.
    pub(crate) fn unbind(&mut self) {
        self.is_bound = false;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    pub source: SourceId,
    pub name: String,
    pub data_type: DataType,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

/// Reference to column `index` of the query `query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub query: QueryId,
    pub index: usize,
    pub data_type: DataType,
}

/// A function call. `Convert` takes the target type as its first argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub data_type: DataType,
    pub args: Vec<Expression>,
    #[serde(default)]
    pub flags: FunctionFlags,
}

impl Function {
    pub fn new(name: impl Into<String>, data_type: DataType, args: Vec<Expression>) -> Self {
        let nullable = args.iter().any(Expression::can_be_null);
        Self {
            name: name.into(),
            data_type,
            args,
            flags: FunctionFlags {
                nullable,
                ..Default::default()
            },
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFlags {
    pub aggregate: bool,
    /// Deterministic and side-effect free; only pure functions are folded.
    pub pure: bool,
    pub nullable: bool,
}

impl Default for FunctionFlags {
    fn default() -> Self {
        Self {
            aggregate: false,
            pure: true,
            nullable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Concat,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Concat => "||",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::Less => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        }
    }

    pub fn precedence(self) -> i32 {
        match self {
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => {
                precedence::MULTIPLICATIVE
            }
            BinaryOperator::Subtract => precedence::SUBTRACTION,
            BinaryOperator::Add | BinaryOperator::Concat => precedence::ADDITIVE,
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::Less
            | BinaryOperator::LessOrEqual
            | BinaryOperator::Greater
            | BinaryOperator::GreaterOrEqual => precedence::COMPARISON,
            BinaryOperator::And => precedence::LOGICAL_CONJUNCTION,
            BinaryOperator::Or => precedence::LOGICAL_DISJUNCTION,
        }
    }
}

/// Represent a binary operation with its static result type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOp {
    pub left: Expression,
    pub operator: BinaryOperator,
    pub right: Expression,
    pub precedence: i32,
    pub data_type: DataType,
    pub nullable: bool,
}

impl BinaryOp {
    pub fn new(
        left: Expression,
        operator: BinaryOperator,
        right: Expression,
        data_type: DataType,
    ) -> Self {
        let nullable = left.can_be_null() || right.can_be_null();
        Self {
            left,
            operator,
            right,
            precedence: operator.precedence(),
            data_type,
            nullable,
        }
    }
}

/// Engine-specific SQL text. `{0}`, `{1}`, ... are replaced by the rendered
/// `args` at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTemplate {
    pub format: String,
    pub precedence: i32,
    pub args: Vec<Expression>,
    pub data_type: DataType,
}

// ---------------------------------------------------------------------------
// Types and literals
// ---------------------------------------------------------------------------

/// Engine-neutral static types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Unknown,
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    Char,
    NChar,
    VarChar,
    NVarChar,
    Text,
    NText,
    Guid,
    Binary,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    /// A duration (time span).
    Interval,
}

impl DataType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::Byte | DataType::Int16 | DataType::Int32 | DataType::Int64 | DataType::UInt64
        )
    }

    /// Floating or fixed point fractional numbers.
    pub fn is_float(self) -> bool {
        matches!(self, DataType::Single | DataType::Double | DataType::Decimal)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            DataType::Char
                | DataType::NChar
                | DataType::VarChar
                | DataType::NVarChar
                | DataType::Text
                | DataType::NText
        )
    }

    /// Date, date/time or date/time with offset.
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            DataType::Date | DataType::DateTime | DataType::DateTimeOffset
        )
    }

    pub fn is_duration(self) -> bool {
        matches!(self, DataType::Interval)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A constant value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "literal_type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Null,
    Boolean(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    /// Signed duration, serialized as milliseconds.
    Interval(#[serde(with = "interval_millis")] TimeDelta),
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// The type a literal has when nothing else is known about it.
    pub fn data_type(&self) -> DataType {
        match self {
            Literal::Null => DataType::Unknown,
            Literal::Boolean(_) => DataType::Boolean,
            Literal::Int(_) => DataType::Int64,
            Literal::UInt(_) => DataType::UInt64,
            Literal::Float(_) => DataType::Double,
            Literal::String(_) => DataType::NVarChar,
            Literal::Date(_) => DataType::Date,
            Literal::DateTime(_) => DataType::DateTime,
            Literal::DateTimeOffset(_) => DataType::DateTimeOffset,
            Literal::Interval(_) => DataType::Interval,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::UInt(n) => write!(f, "{}", n),
            Literal::Float(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Date(d) => write!(f, "DATE '{}'", d),
            Literal::DateTime(dt) => write!(f, "TIMESTAMP '{}'", dt),
            Literal::DateTimeOffset(dt) => write!(f, "TIMESTAMP '{}'", dt.to_rfc3339()),
            Literal::Interval(d) => write!(f, "INTERVAL '{}' MILLISECOND", d.num_milliseconds()),
        }
    }
}

mod interval_millis {
    use chrono::TimeDelta;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        TimeDelta::try_milliseconds(millis)
            .ok_or_else(|| de::Error::custom(format!("interval out of range: {millis} ms")))
    }
}
