//! Generic SQL Dialect

use super::{DialectImpl, DialectType};

/// Generic dialect: every capability, no conversion quirks
pub struct GenericDialect;

impl DialectImpl for GenericDialect {
    fn dialect_type(&self) -> DialectType {
        DialectType::Generic
    }
}
