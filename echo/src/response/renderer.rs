//! Template rendering.
//!
//! A response key has the shape `<intent>.<context>`. Lookup prefers the
//! named context and falls back to the intent's `default` templates. Every
//! failure mode renders as a descriptive string; rendering never panics.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::ResponseSpec;
use crate::text;

/// Render context: placeholder name to JSON value.
pub type Context = serde_json::Map<String, Value>;

#[derive(Debug, Default)]
pub struct ResponseRenderer;

impl ResponseRenderer {
    pub fn render(
        &self,
        key: &str,
        context: &Context,
        responses: &HashMap<String, ResponseSpec>,
    ) -> String {
        let Some((intent, context_name)) = key.split_once('.') else {
            return format!("Invalid response key format: {}", key);
        };

        let Some(spec) = responses.get(intent) else {
            return format!("No responses found for intent: {}", intent);
        };

        let templates = if context_name == "default" {
            &spec.default
        } else {
            spec.contexts.get(context_name).unwrap_or(&spec.default)
        };

        fill_template(templates.pick(), context)
    }
}

fn fill_template(template: &str, context: &Context) -> String {
    let mut missing: Option<String> = None;

    let filled = text::PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
        let name = &caps[1];
        match context.get(name) {
            Some(value) => display_value(value),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    if let Some(name) = missing {
        return format!("Error: missing context variable '{}' in template", name);
    }

    filled.into_owned()
}

/// Spoken form of a context value. `null` reads as `(not specified)`;
/// strings are substituted without quotes.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "(not specified)".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Templates;
    use serde_json::json;

    fn responses() -> HashMap<String, ResponseSpec> {
        let mut map = HashMap::new();
        map.insert(
            "get_time".to_string(),
            ResponseSpec {
                default: Templates::One("It's {formatted_time}.".into()),
                contexts: [(
                    "formal".to_string(),
                    Templates::Many(vec!["The current time is {formatted_time}.".into()]),
                )]
                .into_iter()
                .collect(),
            },
        );
        map
    }

    fn context(pairs: &[(&str, Value)]) -> Context {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn default_key_uses_default_templates() {
        let renderer = ResponseRenderer;
        let ctx = context(&[("formatted_time", json!("2:30 PM"))]);

        assert_eq!(
            renderer.render("get_time.default", &ctx, &responses()),
            "It's 2:30 PM."
        );
    }

    #[test]
    fn named_context_is_preferred() {
        let renderer = ResponseRenderer;
        let ctx = context(&[("formatted_time", json!("2:30 PM"))]);

        assert_eq!(
            renderer.render("get_time.formal", &ctx, &responses()),
            "The current time is 2:30 PM."
        );
    }

    #[test]
    fn unknown_context_falls_back_to_default() {
        let renderer = ResponseRenderer;
        let ctx = context(&[("formatted_time", json!("2:30 PM"))]);

        assert_eq!(
            renderer.render("get_time.nonexistent", &ctx, &responses()),
            "It's 2:30 PM."
        );
    }

    #[test]
    fn null_renders_as_not_specified() {
        let renderer = ResponseRenderer;
        let ctx = context(&[("formatted_time", Value::Null)]);

        assert_eq!(
            renderer.render("get_time.default", &ctx, &responses()),
            "It's (not specified)."
        );
    }

    #[test]
    fn missing_variable_yields_error_string() {
        let renderer = ResponseRenderer;
        let out = renderer.render("get_time.default", &Context::new(), &responses());
        assert!(out.contains("missing context variable 'formatted_time'"));
    }

    #[test]
    fn unknown_intent_yields_error_string() {
        let renderer = ResponseRenderer;
        let out = renderer.render("nope.default", &Context::new(), &responses());
        assert!(out.contains("No responses found"));
    }

    #[test]
    fn malformed_key_yields_error_string() {
        let renderer = ResponseRenderer;
        let out = renderer.render("nodot", &Context::new(), &responses());
        assert!(out.contains("Invalid response key"));
    }

    #[test]
    fn numbers_render_without_quotes() {
        assert_eq!(display_value(&json!(42)), "42");
        assert_eq!(display_value(&json!(3.5)), "3.5");
        assert_eq!(display_value(&json!("text")), "text");
    }
}
