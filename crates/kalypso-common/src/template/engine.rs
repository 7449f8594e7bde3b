//! Template engine
//!
//! minijinja with the default `{{ ... }}` delimiters and strict undefined
//! handling: a manifest referring to a value the data bundle does not carry
//! is a template error, not a silently empty string.

use minijinja::{Environment, UndefinedBehavior, Value};

use super::error::TemplateError;
use super::filters;

/// Upper bound on nested re-expansion passes per manifest.
pub const TEMPLATE_RECURSION_LIMIT: usize = 8;

/// Engine for expanding manifest templates against an assignment data bundle
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create an engine with the scheduler filter set registered.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.add_filter("toYaml", filters::to_yaml);
        env.add_filter("stringify", filters::stringify);
        env.add_filter("hash", filters::hash);
        env.add_filter("unquote", filters::unquote);
        env.add_filter("b64enc", filters::b64enc);
        env.add_filter("b64dec", filters::b64dec);
        env.add_filter("quote", filters::quote);
        env.add_filter("indent", filters::indent);
        env.add_filter("nindent", filters::nindent);

        Self { env }
    }

    /// Render a single template pass.
    pub fn render(&self, source: &str, data: &Value) -> Result<String, TemplateError> {
        Ok(self.env.render_str(source, data)?)
    }

    /// Render with nested re-expansion.
    ///
    /// Output still containing `{{` is rendered again against the same data
    /// bundle. Expansion stops at a fixpoint (output equal to input, or free
    /// of `{{`); exceeding [`TEMPLATE_RECURSION_LIMIT`] while still changing
    /// is an error.
    pub fn render_nested(&self, source: &str, data: &Value) -> Result<String, TemplateError> {
        let mut current = source.to_string();
        for _ in 0..TEMPLATE_RECURSION_LIMIT {
            let rendered = self.render(&current, data)?;
            if !rendered.contains("{{") || rendered == current {
                return Ok(rendered);
            }
            current = rendered;
        }
        Err(TemplateError::RecursionLimit {
            limit: TEMPLATE_RECURSION_LIMIT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> Value {
        Value::from_serialize(json!({
            "Namespace": "dev-drone-app1",
            "Workload": "app1",
            "ConfigData": {
                "replicas": "3",
                "block": "workload: {{ Workload }}"
            }
        }))
    }

    #[test]
    fn renders_plain_substitution() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("namespace: {{ Namespace }}", &data())
            .unwrap();
        assert_eq!(out, "namespace: dev-drone-app1");
    }

    #[test]
    fn builtin_filters_are_available() {
        let engine = TemplateEngine::new();
        let out = engine.render("{{ Workload | upper }}", &data()).unwrap();
        assert_eq!(out, "APP1");
    }

    #[test]
    fn custom_filters_are_registered() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("{{ ConfigData.replicas | unquote }}", &data())
            .unwrap();
        assert_eq!(out, "3");
    }

    #[test]
    fn undefined_values_are_errors() {
        let engine = TemplateEngine::new();
        let err = engine.render("{{ Missing }}", &data()).unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
    }

    #[test]
    fn nested_output_is_re_expanded() {
        let engine = TemplateEngine::new();
        // first pass emits the block, which itself is a template
        let out = engine
            .render_nested("{{ ConfigData.block }}", &data())
            .unwrap();
        assert_eq!(out, "workload: app1");
    }

    #[test]
    fn stable_output_with_braces_is_a_fixpoint() {
        let engine = TemplateEngine::new();
        let data = Value::from_serialize(json!({"Literal": "{{"}));
        let out = engine.render_nested("{{ Literal }}", &data).unwrap();
        assert_eq!(out, "{{");
    }

    #[test]
    fn runaway_expansion_hits_the_limit() {
        let engine = TemplateEngine::new();
        // each pass strips one quote layer and re-exposes a growing template
        let data = Value::from_serialize(json!({
            "A": "{{ B }}x",
            "B": "{{ A }}"
        }));
        let err = engine.render_nested("{{ A }}", &data).unwrap_err();
        assert!(matches!(err, TemplateError::RecursionLimit { .. }));
    }

    #[test]
    fn identical_inputs_render_identically() {
        let engine = TemplateEngine::new();
        let a = engine
            .render_nested("cfg: {{ ConfigData | toYaml | nindent(2) }}", &data())
            .unwrap();
        let b = engine
            .render_nested("cfg: {{ ConfigData | toYaml | nindent(2) }}", &data())
            .unwrap();
        assert_eq!(a, b);
    }
}
