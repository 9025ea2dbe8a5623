//! SQL Optimizer Module
//!
//! This module contains the lowering passes that rewrite a statement tree
//! into a form a specific engine accepts, plus the constant evaluator the
//! passes and dialect conversions share.

/// Multi-table DELETE/UPDATE rewriting into correlated single-table form
pub mod dml;
/// Best-effort constant folding
pub mod evaluate;
/// Main optimizer entry point and pass orchestration
pub mod optimizer;
/// Ordering correction and ROW_NUMBER pagination emulation
pub mod pagination;
/// Parameter de-binding for engines that reject placeholders
pub mod parameters;
/// Projection fix-up for grouped queries
pub mod projection;

/// DML rewrite pass
pub use dml::{rewrite_dml, SYNTHETIC_ALIAS};
/// Constant evaluation
pub use evaluate::{is_constant, try_evaluate, EvaluationContext};
/// Pass orchestration and configuration
pub use optimizer::{Optimizer, OptimizerConfig, Pass, PassList, BASE_PASSES};
/// Pagination passes
pub use pagination::{correct_pagination, emulate_pagination, PAGED_SOURCE_ALIAS, ROW_NUMBER_ALIAS};
/// Parameter passes
pub use parameters::{debind_insert_parameters, inline_all_parameters, inline_function_parameters};
/// Projection pass
pub use projection::fix_empty_projection;
