//! Optimizer Orchestration Module
//!
//! This module provides the main entry point for statement lowering: the
//! named [`Pass`]es, the ordered [`PassList`] a dialect builds from the base
//! sequence, and the [`Optimizer`] that runs that list over one statement.
//!
//! Pass ordering is data. Every pass list starts with [`BASE_PASSES`] in
//! their fixed order; a dialect can insert its own passes before or after
//! any entry or append them, but it cannot remove or reorder the base ones.

use crate::dialects::DialectImpl;
use crate::error::Result;
use crate::expressions::Statement;
use crate::rewrite::transform_up;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::dml::rewrite_dml;
use super::evaluate::EvaluationContext;
use super::pagination::{correct_pagination, emulate_pagination};
use super::parameters::{
    debind_insert_parameters, inline_all_parameters, inline_function_parameters,
};
use super::projection::fix_empty_projection;

/// Optimizer configuration
///
/// These switches come from the host application rather than from the
/// engine's capability profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Inline every parameter used as a function argument, even when the
    /// engine could bind it
    pub inline_function_parameters: bool,
    /// Inline every parameter of the statement
    pub inline_parameters: bool,
}

/// A named transformation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    /// Give every paginated query an ordering
    CorrectPagination,
    /// Rewrite multi-table DELETE/UPDATE into a single-table form
    RewriteDml,
    /// Give every grouped query at least one projected column
    FixEmptyProjection,
    /// Replace OFFSET/FETCH with a ROW_NUMBER filter
    EmulatePagination,
    /// Inline parameters that feed inserted values
    DebindInsertParameters,
    /// Inline parameters used as function arguments
    InlineFunctionParameters,
    /// Inline every parameter
    InlineAllParameters,
    /// Apply the dialect's node-level conversions bottom-up
    ConvertExpressions,
}

impl Pass {
    pub fn name(self) -> &'static str {
        match self {
            Pass::CorrectPagination => "correct_pagination",
            Pass::RewriteDml => "rewrite_dml",
            Pass::FixEmptyProjection => "fix_empty_projection",
            Pass::EmulatePagination => "emulate_pagination",
            Pass::DebindInsertParameters => "debind_insert_parameters",
            Pass::InlineFunctionParameters => "inline_function_parameters",
            Pass::InlineAllParameters => "inline_all_parameters",
            Pass::ConvertExpressions => "convert_expressions",
        }
    }

    /// Whether this pass belongs to the dialect-agnostic base sequence.
    pub fn is_base(self) -> bool {
        BASE_PASSES.contains(&self)
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Base passes in order of execution.
///
/// Pagination correction runs before the empty-projection fix-up: when a
/// grouped query is also paginated, pass 1 projects the source keys and
/// orders by them, and pass 3 then finds a non-empty projection.
pub const BASE_PASSES: &[Pass] = &[
    Pass::CorrectPagination,
    Pass::RewriteDml,
    Pass::FixEmptyProjection,
];

/// Ordered list of passes run for one dialect.
///
/// A pass appears at most once. Adding a pass that is already present is a
/// no-op, so dialects can compose lists without checking first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassList {
    passes: Vec<Pass>,
}

impl Default for PassList {
    fn default() -> Self {
        Self::base()
    }
}

impl PassList {
    /// The base sequence and nothing else.
    pub fn base() -> Self {
        Self {
            passes: BASE_PASSES.to_vec(),
        }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn iter(&self) -> impl Iterator<Item = Pass> + '_ {
        self.passes.iter().copied()
    }

    pub fn contains(&self, pass: Pass) -> bool {
        self.passes.contains(&pass)
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Append `pass` at the end.
    pub fn push(&mut self, pass: Pass) -> &mut Self {
        if !self.contains(pass) {
            self.passes.push(pass);
        }
        self
    }

    /// Insert `pass` right before `anchor`, or append it if `anchor` is absent.
    pub fn insert_before(&mut self, anchor: Pass, pass: Pass) -> &mut Self {
        if self.contains(pass) {
            return self;
        }
        match self.position(anchor) {
            Some(index) => self.passes.insert(index, pass),
            None => self.passes.push(pass),
        }
        self
    }

    /// Insert `pass` right after `anchor`, or append it if `anchor` is absent.
    pub fn insert_after(&mut self, anchor: Pass, pass: Pass) -> &mut Self {
        if self.contains(pass) {
            return self;
        }
        match self.position(anchor) {
            Some(index) => self.passes.insert(index + 1, pass),
            None => self.passes.push(pass),
        }
        self
    }

    fn position(&self, pass: Pass) -> Option<usize> {
        self.passes.iter().position(|p| *p == pass)
    }
}

/// Runs a dialect's pass list over statements.
pub struct Optimizer<'a> {
    dialect: &'a dyn DialectImpl,
    config: OptimizerConfig,
    context: EvaluationContext,
}

impl<'a> Optimizer<'a> {
    pub fn new(dialect: &'a dyn DialectImpl) -> Self {
        Self {
            dialect,
            config: OptimizerConfig::default(),
            context: EvaluationContext::default(),
        }
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Evaluation context handed to constant folding during conversions.
    pub fn with_context(mut self, context: EvaluationContext) -> Self {
        self.context = context;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// The pass list this optimizer runs.
    pub fn passes(&self) -> PassList {
        self.dialect.passes(&self.config)
    }

    /// Lower `statement` for the dialect.
    ///
    /// Passes run in list order. The first failing pass aborts the pipeline
    /// and its error is returned; the partially rewritten tree is dropped.
    pub fn transform_statement(&self, statement: Statement) -> Result<Statement> {
        self.transform_with_passes(statement, &self.passes())
    }

    /// Lower `statement` with an explicit pass list.
    pub fn transform_with_passes(
        &self,
        mut statement: Statement,
        passes: &PassList,
    ) -> Result<Statement> {
        for pass in passes.iter() {
            debug!(
                dialect = self.dialect.name(),
                pass = pass.name(),
                query_type = ?statement.query_type(),
                "running pass"
            );
            statement = self.apply_pass(statement, pass)?;
        }
        Ok(statement)
    }

    /// Apply a single pass
    fn apply_pass(&self, statement: Statement, pass: Pass) -> Result<Statement> {
        match pass {
            Pass::CorrectPagination => correct_pagination(statement),
            Pass::RewriteDml => {
                if self.dialect.capabilities().supports_multi_table_dml {
                    Ok(statement)
                } else {
                    rewrite_dml(statement)
                }
            }
            Pass::FixEmptyProjection => fix_empty_projection(statement),
            Pass::EmulatePagination => emulate_pagination(statement),
            Pass::DebindInsertParameters => debind_insert_parameters(statement),
            Pass::InlineFunctionParameters => inline_function_parameters(statement),
            Pass::InlineAllParameters => inline_all_parameters(statement),
            Pass::ConvertExpressions => transform_up(statement, |expr| {
                self.dialect.convert_expression(expr, &self.context)
            }),
        }
    }
}
