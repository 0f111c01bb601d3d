//! Template interpolation for judge prompts.
//!
//! Placeholders are written `{{ name }}`; whitespace inside the braces is
//! optional. Substitution is a single pass, so substituted values are never
//! themselves interpolated.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Values for template interpolation, keyed by placeholder name.
pub type Vars = HashMap<String, String>;

/// The default analysis prompt.
pub const ANALYSIS_TEMPLATE: &str = include_str!("../prompts/analysis.md");

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("compile placeholder regex")
});

/// Interpolate a template string with the given variables.
///
/// Unknown placeholders are left as-is in the template.
///
/// # Examples
///
/// ```
/// use agentprobe::template::{render, Vars};
///
/// let mut vars = Vars::new();
/// vars.insert("tool_name".to_string(), "gh".to_string());
///
/// let result = render("Use {{ tool_name }} for {{ other }}", &vars);
/// assert_eq!(result, "Use gh for {{ other }}");
/// ```
pub fn render(template: &str, vars: &Vars) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
