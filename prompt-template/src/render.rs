//! Rendering of compiled templates against a JSON variable mapping.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{TemplateError, TemplateResult};
use crate::parser::{BlockKind, CompiledTemplate, DataVar, Node, Path, PathRoot};

/// Named partials available during a render.
#[derive(Clone, Debug, Default)]
pub struct Partials {
    entries: HashMap<String, Arc<CompiledTemplate>>,
}

impl Partials {
    /// Creates an empty partial set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a compiled partial under `name`, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, template: Arc<CompiledTemplate>) {
        self.entries.insert(name.into(), template);
    }

    /// Returns the partial registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<CompiledTemplate>> {
        self.entries.get(name)
    }

    /// Returns `true` if a partial is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered partials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no partials are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug)]
struct IterData {
    index: usize,
    len: usize,
    key: Option<String>,
}

struct Frame {
    value: Value,
    data: Option<IterData>,
}

pub(crate) struct Renderer<'a> {
    pub(crate) partials: &'a Partials,
    pub(crate) strict: bool,
    pub(crate) max_partial_depth: usize,
}

impl Renderer<'_> {
    pub(crate) fn render(
        &self,
        template: &CompiledTemplate,
        variables: &Map<String, Value>,
    ) -> TemplateResult<String> {
        let mut scopes = vec![Frame {
            value: Value::Object(variables.clone()),
            data: None,
        }];
        let mut out = String::with_capacity(template.source().len());
        self.render_nodes(template.nodes(), &mut scopes, 0, &mut out)?;
        Ok(out)
    }

    fn render_nodes(
        &self,
        nodes: &[Node],
        scopes: &mut Vec<Frame>,
        depth: usize,
        out: &mut String,
    ) -> TemplateResult<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Variable(path) => match resolve(scopes, path) {
                    Some(value) => write_value(&value, out),
                    None if self.strict => {
                        return Err(TemplateError::MissingVariable {
                            name: path.raw.clone(),
                        });
                    }
                    None => {}
                },
                Node::Block {
                    kind,
                    path,
                    body,
                    inverse,
                } => match kind {
                    BlockKind::If | BlockKind::Unless => {
                        let truthy = resolve(scopes, path).is_some_and(|value| is_truthy(&value));
                        let take_body = truthy == (*kind == BlockKind::If);
                        let branch = if take_body { body } else { inverse };
                        self.render_nodes(branch, scopes, depth, out)?;
                    }
                    BlockKind::Each => {
                        let items = resolve(scopes, path)
                            .map(|value| iteration_items(&value))
                            .unwrap_or_default();
                        if items.is_empty() {
                            self.render_nodes(inverse, scopes, depth, out)?;
                            continue;
                        }
                        let len = items.len();
                        for (index, (key, item)) in items.into_iter().enumerate() {
                            scopes.push(Frame {
                                value: item,
                                data: Some(IterData { index, len, key }),
                            });
                            let result = self.render_nodes(body, scopes, depth, out);
                            scopes.pop();
                            result?;
                        }
                    }
                },
                Node::Partial(name) => {
                    let Some(partial) = self.partials.get(name) else {
                        if self.strict {
                            return Err(TemplateError::MissingPartial { name: name.clone() });
                        }
                        continue;
                    };
                    if depth >= self.max_partial_depth {
                        return Err(TemplateError::PartialDepthExceeded {
                            name: name.clone(),
                            limit: self.max_partial_depth,
                        });
                    }
                    self.render_nodes(partial.nodes(), scopes, depth + 1, out)?;
                }
            }
        }
        Ok(())
    }
}

/// Collects `(key, element)` pairs for `{{#each}}`. Scalars iterate as empty.
fn iteration_items(value: &Value) -> Vec<(Option<String>, Value)> {
    match value {
        Value::Array(items) => items.iter().map(|item| (None, item.clone())).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| (Some(key.clone()), item.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

fn resolve<'s>(scopes: &'s [Frame], path: &Path) -> Option<Cow<'s, Value>> {
    match &path.root {
        PathRoot::Data(var) => {
            let data = scopes.iter().rev().find_map(|frame| frame.data.as_ref())?;
            let value = match var {
                DataVar::Index => Value::from(data.index),
                DataVar::First => Value::Bool(data.index == 0),
                DataVar::Last => Value::Bool(data.index + 1 == data.len),
                DataVar::Key => match &data.key {
                    Some(key) => Value::String(key.clone()),
                    None => Value::from(data.index),
                },
            };
            Some(Cow::Owned(value))
        }
        PathRoot::This => {
            let frame = scopes.last()?;
            descend(&frame.value, &path.segments).map(Cow::Borrowed)
        }
        PathRoot::Scope => {
            let (first, rest) = path.segments.split_first()?;
            scopes.iter().rev().find_map(|frame| {
                let head = frame.value.as_object()?.get(first)?;
                descend(head, rest).map(Cow::Borrowed)
            })
        }
    }
}

fn descend<'v>(mut value: &'v Value, segments: &[String]) -> Option<&'v Value> {
    for segment in segments {
        value = match value {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

/// Truthiness used by `if`, `unless`, and `each`.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(text) => out.push_str(text),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            out.push_str(&value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::parser::compile;

    fn vars(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("variables must be an object"),
        }
    }

    fn render_with(source: &str, value: Value, strict: bool, partials: &Partials) -> TemplateResult<String> {
        let compiled = compile(source).unwrap();
        Renderer {
            partials,
            strict,
            max_partial_depth: 4,
        }
        .render(&compiled, &vars(value))
    }

    fn render(source: &str, value: Value) -> String {
        render_with(source, value, false, &Partials::new()).unwrap()
    }

    #[test]
    fn interpolates_values_without_escaping() {
        let out = render(
            "{{name}} <{{{html}}}> {{n}} {{flag}} {{list}} {{nothing}}",
            json!({"name": "Ada", "html": "<b>&</b>", "n": 3.5, "flag": true, "list": [1, 2], "nothing": null}),
        );
        assert_eq!(out, "Ada <<b>&</b>> 3.5 true [1,2] ");
    }

    #[test]
    fn resolves_dotted_and_indexed_paths() {
        let out = render(
            "{{user.name}} {{user.langs.1}}",
            json!({"user": {"name": "Grace", "langs": ["cobol", "fortran"]}}),
        );
        assert_eq!(out, "Grace fortran");
    }

    #[test]
    fn lenient_mode_substitutes_empty_string() {
        assert_eq!(render("Hi {{missing}}!", json!({})), "Hi !");
    }

    #[test]
    fn strict_mode_rejects_missing_variable() {
        let err = render_with("Hi {{missing}}", json!({}), true, &Partials::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingVariable {
                name: "missing".into()
            }
        );
    }

    #[test]
    fn strict_mode_treats_missing_condition_as_falsy() {
        let out = render_with(
            "{{#if vip}}gold{{else}}basic{{/if}}{{#each none}}x{{else}}-{{/each}}",
            json!({}),
            true,
            &Partials::new(),
        )
        .unwrap();
        assert_eq!(out, "basic-");
    }

    #[test]
    fn conditionals_follow_truthiness() {
        let source = "{{#if v}}T{{else}}F{{/if}}";
        for falsy in [json!(null), json!(false), json!(0), json!(""), json!([])] {
            assert_eq!(render(source, json!({ "v": falsy })), "F");
        }
        for truthy in [json!(true), json!(1), json!("x"), json!([0]), json!({})] {
            assert_eq!(render(source, json!({ "v": truthy })), "T");
        }
        assert_eq!(render("{{#unless v}}none{{/unless}}", json!({"v": 0})), "none");
    }

    #[test]
    fn iterates_with_loop_data() {
        let out = render(
            "{{#each items}}{{@index}}:{{this}}{{#if @first}}(first){{/if}}{{#unless @last}}, {{/unless}}{{/each}}",
            json!({"items": ["a", "b", "c"]}),
        );
        assert_eq!(out, "0:a(first), 1:b, 2:c");
    }

    #[test]
    fn iteration_falls_back_to_outer_scope() {
        let out = render(
            "{{#each users}}{{name}}@{{domain}} {{/each}}",
            json!({"domain": "example.com", "users": [{"name": "a"}, {"name": "b"}]}),
        );
        assert_eq!(out, "a@example.com b@example.com ");
    }

    #[test]
    fn iterates_objects_with_keys() {
        let out = render(
            "{{#each limits}}{{@key}}={{.}};{{/each}}",
            json!({"limits": {"cpu": 2, "mem": 512}}),
        );
        assert_eq!(out, "cpu=2;mem=512;");
    }

    #[test]
    fn renders_partials_with_current_scope() {
        let mut partials = Partials::new();
        partials.insert("sig", Arc::new(compile("-- {{team}}").unwrap()));
        let out = render_with("Bye {{> sig}}", json!({"team": "ops"}), true, &partials).unwrap();
        assert_eq!(out, "Bye -- ops");
    }

    #[test]
    fn missing_partial_depends_on_strictness() {
        let empty = Partials::new();
        assert_eq!(render_with("a{{> gone}}b", json!({}), false, &empty).unwrap(), "ab");
        assert_eq!(
            render_with("a{{> gone}}b", json!({}), true, &empty).unwrap_err(),
            TemplateError::MissingPartial {
                name: "gone".into()
            }
        );
    }

    #[test]
    fn recursive_partials_hit_depth_limit() {
        let mut partials = Partials::new();
        partials.insert("loop", Arc::new(compile("x{{> loop}}").unwrap()));
        let err = render_with("{{> loop}}", json!({}), false, &partials).unwrap_err();
        assert_eq!(
            err,
            TemplateError::PartialDepthExceeded {
                name: "loop".into(),
                limit: 4
            }
        );
    }
}
