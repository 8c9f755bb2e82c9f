//! Rule engine deciding whether a catalog table is an aggregate of a star.
//!
//! Two strategies, tried in order for each candidate table:
//!
//! 1. **Explicit** rules authored per cube ([`ExplicitRuleGroup`]). Excludes
//!    from any group remove a table outright; the first matching include
//!    supplies column overrides and an approximate row count.
//! 2. **Default** naming conventions ([`DefaultRules`]), tried when no
//!    include matched or the matched include's columns did not validate.
//!
//! Both strategies bind columns through the same recognizer, so a table
//! accepted by either has an unambiguous binding.

pub mod default;
pub mod explicit;
pub mod naming;
mod recognizer;

pub use default::DefaultRules;
pub use explicit::{
    exclude_table, include_by_table_def, ColumnOverride, ExplicitRuleGroup, IncludeDef,
    IncludeRule, RuleGroup, TableMatcher,
};
