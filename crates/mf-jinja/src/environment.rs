//! Jinja environment setup for SQL scripts

use crate::error::{JinjaError, JinjaResult};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;

/// Jinja environment tuned for SQL
///
/// Undefined values are errors, so a template referencing a field the
/// data does not have fails instead of rendering an empty string. No
/// auto-escaping is applied.
pub struct SqlTemplateEnv<'a> {
    env: Environment<'a>,
}

impl<'a> SqlTemplateEnv<'a> {
    /// Create a new strict SQL environment
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Render `template` against `data`; `name` is only used in errors
    pub fn render<T: Serialize>(&self, name: &str, template: &str, data: &T) -> JinjaResult<String> {
        self.env
            .render_str(template, data)
            .map_err(|e| JinjaError::RenderError {
                path: name.to_string(),
                message: render_message(&e),
            })
    }
}

impl Default for SqlTemplateEnv<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// minijinja keeps the useful detail in the source chain
fn render_message(err: &minijinja::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_render_simple() {
        let env = SqlTemplateEnv::new();
        let mut data = HashMap::new();
        data.insert("Hostname", "db.internal");
        let result = env
            .render("fdw.up.sql", "OPTIONS (host '{{ Hostname }}')", &data)
            .unwrap();
        assert_eq!(result, "OPTIONS (host 'db.internal')");
    }

    #[test]
    fn test_no_escaping() {
        let env = SqlTemplateEnv::new();
        let mut data = HashMap::new();
        data.insert("Password", "p<&>'x");
        let result = env.render("t", "{{ Password }}", &data).unwrap();
        assert_eq!(result, "p<&>'x");
    }

    #[test]
    fn test_undefined_is_error() {
        let env = SqlTemplateEnv::new();
        let data: HashMap<&str, &str> = HashMap::new();
        let err = env.render("fdw.up.sql", "{{ Missing }}", &data).unwrap_err();
        assert!(matches!(err, JinjaError::RenderError { ref path, .. } if path == "fdw.up.sql"));
    }

    #[test]
    fn test_keeps_trailing_newline() {
        let env = SqlTemplateEnv::new();
        let data: HashMap<&str, &str> = HashMap::new();
        assert_eq!(env.render("t", "SELECT 1;\n", &data).unwrap(), "SELECT 1;\n");
    }
}
