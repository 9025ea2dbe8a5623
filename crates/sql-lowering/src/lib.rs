//! SQL Lowering - dialect-specific rewriting of SQL statement trees
//!
//! This library takes a statement tree produced by a query compiler and
//! rewrites it into a form a specific database engine accepts, before the
//! tree is rendered to SQL text.
//!
//! # Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **IR** ([`expressions`], [`builder`]) - Statements, queries, table
//!    sources and typed expressions
//! 2. **Traversal** ([`traversal`], [`rewrite`]) - Read-only walks and
//!    owned, bottom-up or top-down rewriting
//! 3. **Optimizer** ([`optimizer`]) - The ordered pass list: base passes
//!    followed by the passes a dialect's capabilities call for
//! 4. **Dialects** ([`dialects`]) - Capability profiles and node-level
//!    conversions for each engine
//!
//! # Example
//!
//! ```
//! use sql_lowering::builder::{table_ref, IrBuilder};
//! use sql_lowering::expressions::{DataType, Expression, FieldDef, Statement};
//! use sql_lowering::{transform_statement, DialectType};
//!
//! let mut b = IrBuilder::new();
//! let people = b.table(
//!     table_ref("people").with_field(FieldDef::new("id", DataType::Int32).primary_key(0)),
//!     "p",
//! );
//! let query = b.select().from(people).skip(Expression::int(10)).build();
//!
//! let lowered = transform_statement(Statement::from(query), DialectType::SqlCe).unwrap();
//! let query = lowered.select_query().unwrap();
//! assert_eq!(query.order_by.len(), 1);
//! ```

pub mod builder;
pub mod dialects;
pub mod error;
pub mod expressions;
pub mod optimizer;
pub mod rewrite;
pub mod time;
pub mod traversal;

pub use dialects::{
    unregister_custom_dialect, CustomDialectBuilder, Dialect, DialectCapabilities, DialectImpl,
    DialectType,
};
pub use error::{Error, NodeRef, Result};
pub use expressions::{Expression, SelectQuery, Statement};
pub use optimizer::{EvaluationContext, Optimizer, OptimizerConfig, Pass, PassList};
pub use traversal::TreeWalk;

/// Lower a statement for a built-in dialect.
///
/// # Arguments
/// * `statement` - The statement tree to rewrite
/// * `dialect` - The target dialect
///
/// # Returns
/// The rewritten statement, or the first pass failure
pub fn transform_statement(statement: Statement, dialect: DialectType) -> Result<Statement> {
    Dialect::get(dialect).transform_statement(statement)
}

/// Lower a statement using a string dialect name.
///
/// Supports both built-in dialect names and custom dialects registered via
/// [`CustomDialectBuilder`].
pub fn transform_statement_by_name(statement: Statement, dialect: &str) -> Result<Statement> {
    let d = Dialect::get_by_name(dialect)
        .ok_or_else(|| Error::UnknownDialect(dialect.to_string()))?;
    d.transform_statement(statement)
}
