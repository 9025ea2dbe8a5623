//! SQL Dialect Support
//!
//! A dialect is the capability and quirk profile of one database engine. It
//! decides which passes run after the base sequence ([`DialectImpl::passes`])
//! and how individual expressions are rewritten for the engine
//! ([`DialectImpl::convert_expression`]).
//!
//! Built-in dialects are obtained with [`Dialect::get`]. Derived dialects
//! with modified capabilities or extra conversions can be registered at
//! runtime with [`CustomDialectBuilder`] and looked up with
//! [`Dialect::get_by_name`].

mod generic;
mod sqlce;

pub use generic::GenericDialect;
pub use sqlce::SqlCeDialect;

use crate::error::{Error, Result};
use crate::expressions::{Expression, Statement};
use crate::optimizer::{EvaluationContext, Optimizer, OptimizerConfig, Pass, PassList};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock, RwLock};

/// Characters a LIKE pattern treats as wildcards on most engines.
pub const LIKE_CHARACTERS_TO_ESCAPE: &[&str] = &["%", "_", "?", "*", "#", "[", "]"];

/// Built-in dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectType {
    /// Engine with every capability; no quirks
    #[default]
    Generic,
    /// SQL Server Compact Edition
    SqlCe,
}

impl DialectType {
    pub fn name(self) -> &'static str {
        match self {
            DialectType::Generic => "generic",
            DialectType::SqlCe => "sqlce",
        }
    }
}

impl fmt::Display for DialectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DialectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(DialectType::Generic),
            "sqlce" | "sql_ce" | "sqlserverce" => Ok(DialectType::SqlCe),
            _ => Err(Error::UnknownDialect(s.to_string())),
        }
    }
}

/// What an engine can express directly.
///
/// The defaults describe a fully capable engine; dialects switch off what
/// they lack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectCapabilities {
    /// `OFFSET n ROWS FETCH NEXT m ROWS ONLY`
    pub supports_offset_fetch: bool,
    /// Placeholders accepted as function arguments
    pub bound_parameters_in_functions: bool,
    /// Placeholders accepted as inserted column values
    pub bound_parameters_in_insert_columns: bool,
    /// `DELETE`/`UPDATE` over joined sources
    pub supports_multi_table_dml: bool,
}

impl Default for DialectCapabilities {
    fn default() -> Self {
        Self {
            supports_offset_fetch: true,
            bound_parameters_in_functions: true,
            bound_parameters_in_insert_columns: true,
            supports_multi_table_dml: true,
        }
    }
}

/// Pass list derived from a capability profile: the base passes, then the
/// dialect passes the profile calls for, then expression conversion.
pub fn default_passes(capabilities: &DialectCapabilities, config: &OptimizerConfig) -> PassList {
    let mut passes = PassList::base();
    if !capabilities.supports_offset_fetch {
        passes.push(Pass::EmulatePagination);
    }
    if !capabilities.bound_parameters_in_insert_columns {
        passes.push(Pass::DebindInsertParameters);
    }
    if config.inline_function_parameters || !capabilities.bound_parameters_in_functions {
        passes.push(Pass::InlineFunctionParameters);
    }
    if config.inline_parameters {
        passes.push(Pass::InlineAllParameters);
    }
    passes.push(Pass::ConvertExpressions);
    passes
}

/// Trait implemented by each dialect
pub trait DialectImpl: Send + Sync {
    /// Get the dialect type
    fn dialect_type(&self) -> DialectType;

    /// Name used in logs and for lookup
    fn name(&self) -> &str {
        self.dialect_type().name()
    }

    fn capabilities(&self) -> DialectCapabilities {
        DialectCapabilities::default()
    }

    /// Characters the engine's LIKE treats as wildcards. Consumed by literal
    /// escaping, not by the optimizer.
    fn like_characters_to_escape(&self) -> &[&'static str] {
        LIKE_CHARACTERS_TO_ESCAPE
    }

    /// Ordered passes for this dialect
    fn passes(&self, config: &OptimizerConfig) -> PassList {
        default_passes(&self.capabilities(), config)
    }

    /// Rewrite one expression for this engine. Called bottom-up, so the
    /// children of `expr` are already converted.
    fn convert_expression(
        &self,
        expr: Expression,
        _context: &EvaluationContext,
    ) -> Result<Expression> {
        Ok(expr)
    }
}

/// Handle to a built-in or registered dialect
#[derive(Clone)]
pub struct Dialect {
    inner: Arc<dyn DialectImpl>,
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("name", &self.inner.name())
            .field("dialect_type", &self.inner.dialect_type())
            .finish()
    }
}

impl Dialect {
    /// Get a built-in dialect
    pub fn get(dialect_type: DialectType) -> Self {
        let inner: Arc<dyn DialectImpl> = match dialect_type {
            DialectType::Generic => Arc::new(GenericDialect),
            DialectType::SqlCe => Arc::new(SqlCeDialect),
        };
        Self { inner }
    }

    /// Look up a dialect by name: built-in names first, then registered
    /// custom dialects.
    pub fn get_by_name(name: &str) -> Option<Self> {
        if let Ok(dialect_type) = DialectType::from_str(name) {
            return Some(Self::get(dialect_type));
        }
        let registry = CUSTOM_DIALECT_REGISTRY.read().ok()?;
        let custom = registry.get(name)?;
        Some(Self {
            inner: custom.clone(),
        })
    }

    /// An optimizer running this dialect's passes
    pub fn optimizer(&self) -> Optimizer<'_> {
        Optimizer::new(self.inner.as_ref())
    }

    /// Lower a statement with the default optimizer configuration
    pub fn transform_statement(&self, statement: Statement) -> Result<Statement> {
        self.optimizer().transform_statement(statement)
    }

    /// Lower a statement with an explicit optimizer configuration
    pub fn transform_statement_with(
        &self,
        statement: Statement,
        config: &OptimizerConfig,
    ) -> Result<Statement> {
        self.optimizer()
            .with_config(config.clone())
            .transform_statement(statement)
    }
}

impl DialectImpl for Dialect {
    fn dialect_type(&self) -> DialectType {
        self.inner.dialect_type()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> DialectCapabilities {
        self.inner.capabilities()
    }

    fn like_characters_to_escape(&self) -> &[&'static str] {
        self.inner.like_characters_to_escape()
    }

    fn passes(&self, config: &OptimizerConfig) -> PassList {
        self.inner.passes(config)
    }

    fn convert_expression(
        &self,
        expr: Expression,
        context: &EvaluationContext,
    ) -> Result<Expression> {
        self.inner.convert_expression(expr, context)
    }
}

// ---------------------------------------------------------------------------
// Custom dialects
// ---------------------------------------------------------------------------

type ConvertFn = Arc<dyn Fn(Expression) -> Result<Expression> + Send + Sync>;
type PassListModifier = Arc<dyn Fn(&mut PassList) + Send + Sync>;

static CUSTOM_DIALECT_REGISTRY: LazyLock<RwLock<HashMap<String, Arc<CustomDialect>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// A registered dialect derived from a built-in one
struct CustomDialect {
    name: String,
    base: Dialect,
    capabilities: DialectCapabilities,
    like_characters_to_escape: Option<Vec<&'static str>>,
    convert_fn: Option<ConvertFn>,
    passes_modifier: Option<PassListModifier>,
}

impl DialectImpl for CustomDialect {
    fn dialect_type(&self) -> DialectType {
        self.base.dialect_type()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> DialectCapabilities {
        self.capabilities
    }

    fn like_characters_to_escape(&self) -> &[&'static str] {
        match &self.like_characters_to_escape {
            Some(chars) => chars.as_slice(),
            None => self.base.like_characters_to_escape(),
        }
    }

    fn passes(&self, config: &OptimizerConfig) -> PassList {
        let mut passes = default_passes(&self.capabilities, config);
        if let Some(modifier) = &self.passes_modifier {
            modifier(&mut passes);
        }
        passes
    }

    fn convert_expression(
        &self,
        expr: Expression,
        context: &EvaluationContext,
    ) -> Result<Expression> {
        let expr = self.base.convert_expression(expr, context)?;
        match &self.convert_fn {
            Some(convert) => convert(expr),
            None => Ok(expr),
        }
    }
}

/// Builder for registering a custom dialect
///
/// ```
/// use sql_lowering::dialects::{CustomDialectBuilder, Dialect, DialectImpl, DialectType};
///
/// CustomDialectBuilder::new("legacy_ce")
///     .based_on(DialectType::SqlCe)
///     .capabilities_modifier(|caps| caps.supports_offset_fetch = false)
///     .register()
///     .unwrap();
///
/// let dialect = Dialect::get_by_name("legacy_ce").unwrap();
/// assert!(!dialect.capabilities().supports_offset_fetch);
/// # sql_lowering::unregister_custom_dialect("legacy_ce");
/// ```
pub struct CustomDialectBuilder {
    name: String,
    base: DialectType,
    capabilities_modifier: Option<Box<dyn FnOnce(&mut DialectCapabilities)>>,
    like_characters_to_escape: Option<Vec<&'static str>>,
    convert_fn: Option<ConvertFn>,
    passes_modifier: Option<PassListModifier>,
}

impl CustomDialectBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: DialectType::Generic,
            capabilities_modifier: None,
            like_characters_to_escape: None,
            convert_fn: None,
            passes_modifier: None,
        }
    }

    /// Built-in dialect to inherit capabilities and conversions from
    pub fn based_on(mut self, base: DialectType) -> Self {
        self.base = base;
        self
    }

    /// Adjust the capabilities inherited from the base dialect
    pub fn capabilities_modifier<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut DialectCapabilities) + 'static,
    {
        self.capabilities_modifier = Some(Box::new(modifier));
        self
    }

    pub fn like_characters_to_escape(mut self, chars: &[&'static str]) -> Self {
        self.like_characters_to_escape = Some(chars.to_vec());
        self
    }

    /// Extra expression conversion, applied after the base dialect's
    pub fn convert_fn<F>(mut self, convert: F) -> Self
    where
        F: Fn(Expression) -> Result<Expression> + Send + Sync + 'static,
    {
        self.convert_fn = Some(Arc::new(convert));
        self
    }

    /// Adjust the pass list derived from the capabilities
    pub fn passes_modifier<F>(mut self, modifier: F) -> Self
    where
        F: Fn(&mut PassList) + Send + Sync + 'static,
    {
        self.passes_modifier = Some(Arc::new(modifier));
        self
    }

    /// Register the dialect under its name
    pub fn register(self) -> Result<()> {
        if DialectType::from_str(&self.name).is_ok() {
            return Err(Error::Registration(format!(
                "Custom dialect name '{}' collides with built-in dialect",
                self.name
            )));
        }

        let base = Dialect::get(self.base);
        let mut capabilities = base.capabilities();
        if let Some(modifier) = self.capabilities_modifier {
            modifier(&mut capabilities);
        }

        let mut registry = CUSTOM_DIALECT_REGISTRY
            .write()
            .map_err(|_| Error::internal("custom dialect registry poisoned"))?;
        if registry.contains_key(&self.name) {
            return Err(Error::Registration(format!(
                "Custom dialect '{}' is already registered",
                self.name
            )));
        }

        let dialect = CustomDialect {
            name: self.name.clone(),
            base,
            capabilities,
            like_characters_to_escape: self.like_characters_to_escape,
            convert_fn: self.convert_fn,
            passes_modifier: self.passes_modifier,
        };
        registry.insert(self.name, Arc::new(dialect));
        Ok(())
    }
}

/// Remove a registered custom dialect. Returns `true` if it was registered.
pub fn unregister_custom_dialect(name: &str) -> bool {
    CUSTOM_DIALECT_REGISTRY
        .write()
        .map(|mut registry| registry.remove(name).is_some())
        .unwrap_or(false)
}
