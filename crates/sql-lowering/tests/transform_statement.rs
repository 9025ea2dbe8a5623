//! Pipeline Tests
//!
//! End-to-end tests for `transform_statement`: pass ordering, pagination
//! correction and emulation, projection fix-up and failure reporting.

use sql_lowering::builder::{table_ref, IrBuilder};
use sql_lowering::dialects::{Dialect, DialectImpl, DialectType};
use sql_lowering::error::NodeRef;
use sql_lowering::expressions::{
    DataType, Expression, FieldDef, QueryType, SelectQuery, SourceOrigin, Statement, TableRef,
};
use sql_lowering::optimizer::{Pass, PassList, ROW_NUMBER_ALIAS};
use sql_lowering::traversal::TreeWalk;
use sql_lowering::{transform_statement, transform_statement_by_name, Error};

fn people() -> TableRef {
    table_ref("dbo.people")
        .with_field(FieldDef::new("id", DataType::Int32).primary_key(0))
        .with_field(FieldDef::new("name", DataType::NVarChar))
}

fn first_query(statement: &Statement) -> &SelectQuery {
    statement.select_query().expect("statement carries a query")
}

// ============================================================================
// Pagination
// ============================================================================

mod pagination {
    use super::*;

    #[test]
    fn test_skip_without_ordering_orders_by_projection() {
        let mut b = IrBuilder::new();
        let p = b.table(people(), "p");
        let name = p.field("name");
        let query = b
            .select()
            .column(name.clone())
            .from(p)
            .skip(Expression::int(10))
            .build();

        let lowered = transform_statement(Statement::from(query), DialectType::SqlCe).unwrap();
        let query = first_query(&lowered);
        assert_eq!(query.order_by.len(), 1);
        assert_eq!(query.order_by[0].expression, name);
        assert!(query.has_skip(), "SqlCe supports OFFSET, skip must stay");
    }

    #[test]
    fn test_skip_without_columns_projects_keys() {
        let mut b = IrBuilder::new();
        let p = b.table(people(), "p");
        let id = p.field("id");
        let query = b.select().from(p).skip(Expression::int(5)).build();

        let lowered = transform_statement(Statement::from(query), DialectType::Generic).unwrap();
        let query = first_query(&lowered);
        assert_eq!(query.select.columns.len(), 1);
        assert_eq!(query.select.columns[0].expression, id);
        assert_eq!(query.order_by[0].expression, id);
    }

    #[test]
    fn test_existing_ordering_is_kept() {
        let mut b = IrBuilder::new();
        let p = b.table(people(), "p");
        let name = p.field("name");
        let query = b
            .select()
            .column(p.field("id"))
            .from(p)
            .order_by_desc(name)
            .skip(Expression::int(1))
            .build();
        let statement = Statement::from(query);

        let lowered = transform_statement(statement.clone(), DialectType::Generic).unwrap();
        assert_eq!(lowered, statement);
    }

    #[test]
    fn test_nothing_to_order_by_fails() {
        let mut b = IrBuilder::new();
        let keyless = b.table(table_ref("audit"), "a");
        let query = b.select().from(keyless).skip(Expression::int(1)).build();
        let query_id = query.id;

        let err = transform_statement(Statement::from(query), DialectType::SqlCe).unwrap_err();
        match err {
            Error::Pass { pass, node, reason } => {
                assert_eq!(pass, Pass::CorrectPagination);
                assert_eq!(node, NodeRef::Query(query_id));
                assert_eq!(reason, "pagination requires ordering");
            }
            other => panic!("Expected a pass failure, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_query_is_corrected() {
        let mut b = IrBuilder::new();
        let p = b.table(people(), "p");
        let name = p.field("name");
        let inner = b
            .select()
            .column(name.clone())
            .from(p)
            .skip(Expression::int(2))
            .build();
        let derived = b.derived(inner, "d");
        let outer = b.select().from(derived).build();

        let lowered = transform_statement(Statement::from(outer), DialectType::Generic).unwrap();
        let SourceOrigin::Query(inner) = &first_query(&lowered).from[0].origin else {
            panic!("expected derived table");
        };
        assert_eq!(inner.order_by[0].expression, name);
    }

    #[test]
    fn test_emulation_wraps_query_in_row_number_filter() {
        let dialect = Dialect::get(DialectType::Generic);
        let mut passes = PassList::base();
        passes.insert_before(Pass::FixEmptyProjection, Pass::EmulatePagination);

        let mut b = IrBuilder::new();
        let p = b.table(people(), "p");
        let query = b
            .select()
            .column(p.field("name"))
            .from(p)
            .skip(Expression::int(20))
            .take(Expression::int(10))
            .build();
        let outer_id = query.id;

        let lowered = dialect
            .optimizer()
            .transform_with_passes(Statement::from(query), &passes)
            .unwrap();
        let outer = first_query(&lowered);
        assert_eq!(outer.id, outer_id, "The wrapper keeps the original query id");
        assert!(!outer.has_skip());
        assert!(outer.where_clause.is_some());
        assert_eq!(outer.order_by.len(), 1);

        let SourceOrigin::Query(inner) = &outer.from[0].origin else {
            panic!("expected derived table");
        };
        let row_number = inner.select.columns.last().unwrap();
        assert_eq!(row_number.alias.as_deref(), Some(ROW_NUMBER_ALIAS));
        assert!(inner.order_by.is_empty());
        assert!(inner.select.take.is_none());
    }

    #[test]
    fn test_emulated_distinct_numbers_distinct_rows() {
        let dialect = Dialect::get(DialectType::Generic);
        let mut passes = PassList::base();
        passes.insert_before(Pass::FixEmptyProjection, Pass::EmulatePagination);

        let mut b = IrBuilder::new();
        let p = b.table(people(), "p");
        let name = p.field("name");
        let query = b
            .select()
            .distinct()
            .column(name.clone())
            .from(p)
            .order_by(name)
            .skip(Expression::int(1))
            .build();

        let lowered = dialect
            .optimizer()
            .transform_with_passes(Statement::from(query), &passes)
            .unwrap();
        let outer = first_query(&lowered);
        assert_eq!(outer.select.columns.len(), 1);

        let SourceOrigin::Query(numbered) = &outer.from[0].origin else {
            panic!("expected derived table");
        };
        assert!(!numbered.select.distinct, "The row number must not take part in DISTINCT");
        assert_eq!(
            numbered.select.columns.last().and_then(|c| c.alias.as_deref()),
            Some(ROW_NUMBER_ALIAS)
        );

        let SourceOrigin::Query(distinct) = &numbered.from[0].origin else {
            panic!("expected the DISTINCT query as a derived table");
        };
        assert!(distinct.select.distinct);
        assert_eq!(distinct.select.columns.len(), 1);
        assert!(distinct.select.skip.is_none());
    }
}

// ============================================================================
// Projection and pass ordering
// ============================================================================

mod pipeline {
    use super::*;

    #[test]
    fn test_grouped_query_without_columns_gets_constant() {
        let mut b = IrBuilder::new();
        let p = b.table(people(), "p");
        let query = b.select().from(p.clone()).group_by(p.field("name")).build();

        let lowered = transform_statement(Statement::from(query), DialectType::SqlCe).unwrap();
        let query = first_query(&lowered);
        assert_eq!(query.select.columns.len(), 1);
        assert_eq!(query.select.columns[0].expression, Expression::int(1));
    }

    #[test]
    fn test_passes_start_with_base_sequence() {
        for dialect_type in [DialectType::Generic, DialectType::SqlCe] {
            let dialect = Dialect::get(dialect_type);
            let passes = dialect.optimizer().passes();
            assert_eq!(
                &passes.passes()[..3],
                &[Pass::CorrectPagination, Pass::RewriteDml, Pass::FixEmptyProjection],
                "Base passes out of order for {}",
                dialect_type
            );
            assert_eq!(passes.iter().last(), Some(Pass::ConvertExpressions));
        }
    }

    #[test]
    fn test_statements_without_queries_pass_through() {
        let statement = Statement::DropTable(Box::new(
            sql_lowering::expressions::DropTableStatement {
                table: people(),
                if_exists: true,
            },
        ));
        let lowered = transform_statement(statement.clone(), DialectType::SqlCe).unwrap();
        assert_eq!(lowered, statement);
        assert_eq!(lowered.query_type(), QueryType::DropTable);
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let mut b = IrBuilder::new();
        let p = b.table(people(), "p");
        let query = b
            .select()
            .from(p.clone())
            .group_by(p.field("name"))
            .skip(Expression::int(3))
            .build();

        let once = transform_statement(Statement::from(query), DialectType::SqlCe).unwrap();
        let twice = transform_statement(once.clone(), DialectType::SqlCe).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_query_ids_stay_unique() {
        let dialect = Dialect::get(DialectType::Generic);
        let mut passes = dialect.optimizer().passes();
        passes.insert_after(Pass::FixEmptyProjection, Pass::EmulatePagination);

        let mut b = IrBuilder::new();
        let p = b.table(people(), "p");
        let inner = b.select().column(p.field("name")).from(p).skip(Expression::int(1)).build();
        let derived = b.derived(inner, "d");
        let d_name = derived.key_expressions().remove(0);
        let outer = b.select().column(d_name).from(derived).skip(Expression::int(1)).build();

        let lowered = dialect
            .optimizer()
            .transform_with_passes(Statement::from(outer), &passes)
            .unwrap();
        let mut ids = lowered.query_ids();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total, "Duplicate query ids after emulation");
    }
}

// ============================================================================
// Dialect lookup
// ============================================================================

mod lookup {
    use super::*;

    #[test]
    fn test_transform_by_name() {
        let mut b = IrBuilder::new();
        let p = b.table(people(), "p");
        let query = b.select().column(p.field("id")).from(p).build();
        let statement = Statement::from(query);

        let lowered = transform_statement_by_name(statement.clone(), "sqlce").unwrap();
        assert_eq!(lowered, statement);
    }

    #[test]
    fn test_unknown_dialect_name() {
        let statement = Statement::from(SelectQuery::default());
        let err = transform_statement_by_name(statement, "no_such_dialect").unwrap_err();
        assert_eq!(err, Error::UnknownDialect("no_such_dialect".to_string()));
        assert_eq!(err.to_string(), "Unknown dialect: no_such_dialect");
    }

    #[test]
    fn test_dialect_names() {
        assert_eq!(Dialect::get(DialectType::SqlCe).name(), "sqlce");
        assert_eq!(Dialect::get(DialectType::Generic).name(), "generic");
    }
}
