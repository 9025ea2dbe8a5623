//! Tests for custom dialect support.
//!
//! These tests validate the `CustomDialectBuilder` API, the global custom dialect
//! registry, and name-based dialect lookup and lowering.

use sql_lowering::builder::{table_ref, IrBuilder};
use sql_lowering::dialects::{CustomDialectBuilder, Dialect, DialectImpl, DialectType};
use sql_lowering::expressions::{DataType, Expression, FieldDef, Statement};
use sql_lowering::optimizer::{OptimizerConfig, Pass};
use sql_lowering::traversal::is_function_named;
use sql_lowering::{transform_statement_by_name, unregister_custom_dialect, Error, TreeWalk};

/// Helper to ensure cleanup after each test, even on panic.
struct DialectGuard(&'static str);

impl Drop for DialectGuard {
    fn drop(&mut self) {
        unregister_custom_dialect(self.0);
    }
}

fn paged_query() -> Statement {
    let mut b = IrBuilder::new();
    let t = b.table(
        table_ref("items")
            .with_field(FieldDef::new("id", DataType::Int32).primary_key(0))
            .with_field(FieldDef::new("name", DataType::NVarChar)),
        "i",
    );
    let query = b
        .select()
        .column(t.field("name"))
        .from(t)
        .skip(Expression::int(10))
        .build();
    Statement::from(query)
}

#[test]
fn test_custom_dialect_inherits_base() {
    let _guard = DialectGuard("test_inherits_ce");

    CustomDialectBuilder::new("test_inherits_ce")
        .based_on(DialectType::SqlCe)
        .register()
        .unwrap();

    let d = Dialect::get_by_name("test_inherits_ce").unwrap();
    assert_eq!(d.name(), "test_inherits_ce");
    assert_eq!(d.dialect_type(), DialectType::SqlCe);
    assert_eq!(d.capabilities(), Dialect::get(DialectType::SqlCe).capabilities());
    assert_eq!(d.like_characters_to_escape(), &["_", "%"]);
}

#[test]
fn test_custom_dialect_capabilities_drive_passes() {
    let _guard = DialectGuard("test_no_offset");

    CustomDialectBuilder::new("test_no_offset")
        .based_on(DialectType::SqlCe)
        .capabilities_modifier(|caps| caps.supports_offset_fetch = false)
        .register()
        .unwrap();

    let d = Dialect::get_by_name("test_no_offset").unwrap();
    let passes = d.passes(&OptimizerConfig::default());
    assert!(passes.contains(Pass::EmulatePagination));

    let lowered = transform_statement_by_name(paged_query(), "test_no_offset").unwrap();
    let query = lowered.select_query().unwrap();
    assert!(!query.has_skip(), "Expected skip to be emulated, got {:?}", query);
}

#[test]
fn test_custom_convert_runs_after_base() {
    let _guard = DialectGuard("test_convert");

    // Rename Len to Length on top of the SqlCe conversions
    CustomDialectBuilder::new("test_convert")
        .based_on(DialectType::SqlCe)
        .convert_fn(|expr| match expr {
            Expression::Function(mut f) if f.is("Len") => {
                f.name = "Length".to_string();
                Ok(Expression::Function(f))
            }
            other => Ok(other),
        })
        .register()
        .unwrap();

    let mut b = IrBuilder::new();
    let t = b.table(
        table_ref("items").with_field(FieldDef::new("ratio", DataType::Double)),
        "i",
    );
    let len = Expression::function("Len", DataType::Int32, vec![t.field("ratio")]);
    let unsigned = Expression::convert(DataType::UInt64, t.field("ratio"));
    let statement = Statement::from(b.select().column(len).column(unsigned).from(t).build());

    let lowered = transform_statement_by_name(statement, "test_convert").unwrap();
    assert!(lowered.contains(|n| is_function_named(n, "Length")));
    assert!(!lowered.contains(|n| is_function_named(n, "Len")));
    assert!(
        lowered.contains(|n| is_function_named(n, "Floor")),
        "Base SqlCe conversion should still apply"
    );
}

#[test]
fn test_custom_passes_modifier() {
    let _guard = DialectGuard("test_passes");

    CustomDialectBuilder::new("test_passes")
        .passes_modifier(|passes| {
            passes.insert_before(Pass::ConvertExpressions, Pass::InlineAllParameters);
        })
        .register()
        .unwrap();

    let d = Dialect::get_by_name("test_passes").unwrap();
    let passes = d.passes(&OptimizerConfig::default());
    let names: Vec<&str> = passes.iter().map(Pass::name).collect();
    assert_eq!(
        names,
        vec![
            "correct_pagination",
            "rewrite_dml",
            "fix_empty_projection",
            "inline_all_parameters",
            "convert_expressions",
        ]
    );
}

#[test]
fn test_custom_escape_set() {
    let _guard = DialectGuard("test_escape");

    CustomDialectBuilder::new("test_escape")
        .like_characters_to_escape(&["%"])
        .register()
        .unwrap();

    let d = Dialect::get_by_name("test_escape").unwrap();
    assert_eq!(d.like_characters_to_escape(), &["%"]);
}

#[test]
fn test_duplicate_registration_fails() {
    let _guard = DialectGuard("test_dup");

    CustomDialectBuilder::new("test_dup").register().unwrap();
    let err = CustomDialectBuilder::new("test_dup").register().unwrap_err();
    assert!(
        matches!(&err, Error::Registration(msg) if msg.contains("already registered")),
        "Expected a registration error, got {:?}",
        err
    );
}

#[test]
fn test_builtin_name_collision() {
    let err = CustomDialectBuilder::new("sqlce").register().unwrap_err();
    assert!(
        matches!(&err, Error::Registration(msg) if msg.contains("built-in")),
        "Expected a collision error, got {:?}",
        err
    );
}

#[test]
fn test_unregister() {
    CustomDialectBuilder::new("test_unregister").register().unwrap();
    assert!(Dialect::get_by_name("test_unregister").is_some());

    assert!(unregister_custom_dialect("test_unregister"));
    assert!(Dialect::get_by_name("test_unregister").is_none());
    assert!(!unregister_custom_dialect("test_unregister"));
}

#[test]
fn test_builtin_lookup_by_name() {
    assert!(Dialect::get_by_name("generic").is_some());
    assert!(Dialect::get_by_name("sqlce").is_some());
    assert!(Dialect::get_by_name("nonexistent_dialect").is_none());
}
