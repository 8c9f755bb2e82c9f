//! Naming helpers shared by the rule engine.

use inflector::Inflector;
use regex::Regex;

/// Placeholder substituted with the fact table name in table templates.
pub const FACT_NAME_TOKEN: &str = "${fact_name}";

/// Convention name of a measure: `Unit Sales` -> `unit_sales`.
pub fn measure_column_name(measure: &str) -> String {
    measure.to_snake_case()
}

/// Compile a pattern anchored at both ends.
pub fn anchored_regex(pattern: &str, ignore_case: bool) -> Result<Regex, regex::Error> {
    let flags = if ignore_case { "(?i)" } else { "" };
    Regex::new(&format!("{}^(?:{})$", flags, pattern))
}

/// Expand a table template for one fact table.
///
/// The fact name is escaped, so only the template itself is a pattern.
pub fn expand_template(template: &str, fact_table: &str) -> String {
    template.replace(FACT_NAME_TOKEN, &regex::escape(fact_table))
}
