//! Compiler from template source text to a node tree.
//!
//! Supported tags:
//!
//! | Tag | Meaning |
//! |---|---|
//! | `{{path}}`, `{{{path}}}` | interpolation (no escaping is applied) |
//! | `{{#if path}} … {{else}} … {{/if}}` | truthy conditional |
//! | `{{#unless path}} … {{/unless}}` | falsy conditional |
//! | `{{#each path}} … {{else}} … {{/each}}` | iteration |
//! | `{{> name}}` | partial inclusion |
//! | `{{! comment }}`, `{{!-- comment --}}` | ignored |

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{TemplateError, TemplateResult};

/// Block helpers understood by the engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum BlockKind {
    If,
    Unless,
    Each,
}

impl BlockKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "if" => Some(Self::If),
            "unless" => Some(Self::Unless),
            "each" => Some(Self::Each),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Unless => "unless",
            Self::Each => "each",
        }
    }
}

/// Where a path lookup starts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum PathRoot {
    /// Search enclosing scopes from innermost outwards.
    Scope,
    /// The current scope only (`this`, `.`, `this.x`).
    This,
    /// Iteration data (`@index`, `@first`, `@last`, `@key`).
    Data(DataVar),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum DataVar {
    Index,
    First,
    Last,
    Key,
}

/// A parsed variable reference.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Path {
    pub(crate) raw: String,
    pub(crate) root: PathRoot,
    pub(crate) segments: Vec<String>,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Variable(Path),
    Block {
        kind: BlockKind,
        path: Path,
        body: Vec<Node>,
        inverse: Vec<Node>,
    },
    Partial(String),
}

/// A template compiled into an immutable node tree.
///
/// Compiled templates hold no per-render state and may be shared freely
/// across threads and renders.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompiledTemplate {
    source: String,
    nodes: Vec<Node>,
}

impl CompiledTemplate {
    /// Returns the source text the template was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the root variable names referenced outside iteration blocks,
    /// including the targets of block helpers.
    #[must_use]
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_variables(&self.nodes, &mut names);
        names
    }

    /// Returns the names of the partials the template includes directly.
    #[must_use]
    pub fn partial_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_partials(&self.nodes, &mut names);
        names
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

fn collect_variables(nodes: &[Node], names: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Variable(path) => insert_root(path, names),
            Node::Block {
                kind,
                path,
                body,
                inverse,
            } => {
                insert_root(path, names);
                // Inside `each`, bare names resolve against the element first.
                if *kind != BlockKind::Each {
                    collect_variables(body, names);
                }
                collect_variables(inverse, names);
            }
            Node::Text(_) | Node::Partial(_) => {}
        }
    }
}

fn insert_root(path: &Path, names: &mut BTreeSet<String>) {
    if path.root == PathRoot::Scope
        && let Some(first) = path.segments.first()
    {
        names.insert(first.clone());
    }
}

fn collect_partials(nodes: &[Node], names: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Partial(name) => {
                names.insert(name.clone());
            }
            Node::Block { body, inverse, .. } => {
                collect_partials(body, names);
                collect_partials(inverse, names);
            }
            Node::Text(_) | Node::Variable(_) => {}
        }
    }
}

struct OpenBlock {
    kind: BlockKind,
    path: Path,
    offset: usize,
    body: Vec<Node>,
    inverse: Option<Vec<Node>>,
}

impl OpenBlock {
    fn target(&mut self) -> &mut Vec<Node> {
        match &mut self.inverse {
            Some(inverse) => inverse,
            None => &mut self.body,
        }
    }
}

/// Compiles template source text.
///
/// # Errors
///
/// Returns [`TemplateError::Syntax`] for unterminated tags, empty tags,
/// unknown block helpers, malformed paths, stray `{{else}}` or closing tags,
/// mismatched closing tags, and blocks left open at end of input.
pub fn compile(source: &str) -> TemplateResult<CompiledTemplate> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<OpenBlock> = Vec::new();
    let mut pos = 0;

    while let Some(found) = source[pos..].find("{{") {
        let start = pos + found;
        if start > pos {
            push_node(&mut root, &mut stack, Node::Text(source[pos..start].to_owned()));
        }

        let tag = read_tag(source, start)?;
        pos = tag.end;

        match tag.kind {
            TagKind::Comment => {}
            TagKind::Raw => {
                let path = parse_path(source, start, tag.inner)?;
                push_node(&mut root, &mut stack, Node::Variable(path));
            }
            TagKind::Mustache => {
                handle_mustache(source, start, tag.inner, &mut root, &mut stack)?;
            }
        }
    }

    if pos < source.len() {
        push_node(&mut root, &mut stack, Node::Text(source[pos..].to_owned()));
    }

    if let Some(open) = stack.last() {
        return Err(TemplateError::syntax(
            source,
            open.offset,
            format!(
                "unclosed block `{{{{#{} {}}}}}`",
                open.kind.name(),
                open.path
            ),
        ));
    }

    Ok(CompiledTemplate {
        source: source.to_owned(),
        nodes: root,
    })
}

fn push_node(root: &mut Vec<Node>, stack: &mut [OpenBlock], node: Node) {
    match stack.last_mut() {
        Some(open) => open.target().push(node),
        None => root.push(node),
    }
}

fn handle_mustache(
    source: &str,
    offset: usize,
    inner: &str,
    root: &mut Vec<Node>,
    stack: &mut Vec<OpenBlock>,
) -> TemplateResult<()> {
    if let Some(rest) = inner.strip_prefix('#') {
        let rest = rest.trim();
        let (name, argument) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let kind = BlockKind::parse(name).ok_or_else(|| {
            TemplateError::syntax(source, offset, format!("unknown block helper `{name}`"))
        })?;
        let argument = argument.trim();
        if argument.is_empty() {
            return Err(TemplateError::syntax(
                source,
                offset,
                format!("block helper `{name}` requires an argument"),
            ));
        }
        let path = parse_path(source, offset, argument)?;
        stack.push(OpenBlock {
            kind,
            path,
            offset,
            body: Vec::new(),
            inverse: None,
        });
        return Ok(());
    }

    if let Some(rest) = inner.strip_prefix('/') {
        let name = rest.trim();
        let Some(open) = stack.pop() else {
            return Err(TemplateError::syntax(
                source,
                offset,
                format!("closing tag `{{{{/{name}}}}}` has no matching block"),
            ));
        };
        if open.kind.name() != name {
            return Err(TemplateError::syntax(
                source,
                offset,
                format!(
                    "mismatched closing tag: expected `{{{{/{}}}}}`, found `{{{{/{name}}}}}`",
                    open.kind.name()
                ),
            ));
        }
        let node = Node::Block {
            kind: open.kind,
            path: open.path,
            body: open.body,
            inverse: open.inverse.unwrap_or_default(),
        };
        push_node(root, stack, node);
        return Ok(());
    }

    if inner == "else" {
        return match stack.last_mut() {
            Some(open) if open.inverse.is_none() => {
                open.inverse = Some(Vec::new());
                Ok(())
            }
            Some(_) => Err(TemplateError::syntax(
                source,
                offset,
                "duplicate `{{else}}` in block",
            )),
            None => Err(TemplateError::syntax(
                source,
                offset,
                "`{{else}}` outside of a block",
            )),
        };
    }

    if let Some(rest) = inner.strip_prefix('>') {
        let name = rest.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(TemplateError::syntax(
                source,
                offset,
                "partial tag requires a single name",
            ));
        }
        push_node(root, stack, Node::Partial(name.to_owned()));
        return Ok(());
    }

    if inner.starts_with(['^', '&', '=']) {
        return Err(TemplateError::syntax(
            source,
            offset,
            format!("unsupported tag `{{{{{inner}}}}}`"),
        ));
    }

    let path = parse_path(source, offset, inner)?;
    push_node(root, stack, Node::Variable(path));
    Ok(())
}

enum TagKind {
    Mustache,
    Raw,
    Comment,
}

struct Tag<'a> {
    kind: TagKind,
    inner: &'a str,
    end: usize,
}

fn read_tag(source: &str, start: usize) -> TemplateResult<Tag<'_>> {
    let rest = &source[start..];
    let (kind, open_len, close) = if rest.starts_with("{{{") {
        (TagKind::Raw, 3, "}}}")
    } else if rest.starts_with("{{!--") {
        (TagKind::Comment, 5, "--}}")
    } else if rest.starts_with("{{!") {
        (TagKind::Comment, 3, "}}")
    } else {
        (TagKind::Mustache, 2, "}}")
    };

    let body_start = start + open_len;
    let Some(close_at) = source[body_start..].find(close) else {
        return Err(TemplateError::syntax(source, start, "unterminated tag"));
    };
    let inner = source[body_start..body_start + close_at].trim();

    if inner.contains("{{") {
        return Err(TemplateError::syntax(source, start, "unterminated tag"));
    }
    if inner.is_empty() && !matches!(kind, TagKind::Comment) {
        return Err(TemplateError::syntax(source, start, "empty tag"));
    }

    Ok(Tag {
        kind,
        inner,
        end: body_start + close_at + close.len(),
    })
}

fn parse_path(source: &str, offset: usize, raw: &str) -> TemplateResult<Path> {
    let raw = raw.trim();
    let invalid = || TemplateError::syntax(source, offset, format!("invalid variable path `{raw}`"));

    if raw == "this" || raw == "." {
        return Ok(Path {
            raw: raw.to_owned(),
            root: PathRoot::This,
            segments: Vec::new(),
        });
    }

    if let Some(data) = raw.strip_prefix('@') {
        let var = match data {
            "index" => DataVar::Index,
            "first" => DataVar::First,
            "last" => DataVar::Last,
            "key" => DataVar::Key,
            _ => return Err(invalid()),
        };
        return Ok(Path {
            raw: raw.to_owned(),
            root: PathRoot::Data(var),
            segments: Vec::new(),
        });
    }

    let (root, rest) = match raw.strip_prefix("this.").or_else(|| raw.strip_prefix("./")) {
        Some(rest) => (PathRoot::This, rest),
        None => (PathRoot::Scope, raw),
    };

    let segments: Vec<String> = rest.split('.').map(str::to_owned).collect();
    if segments.iter().any(|segment| !is_segment(segment)) {
        return Err(invalid());
    }

    Ok(Path {
        raw: raw.to_owned(),
        root,
        segments,
    })
}

fn is_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syntax_message(source: &str) -> String {
        match compile(source).expect_err("should fail") {
            TemplateError::Syntax { message, .. } => message,
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn compiles_plain_text() {
        let compiled = compile("no tags here").unwrap();
        assert_eq!(compiled.nodes(), &[Node::Text("no tags here".into())]);
    }

    #[test]
    fn compiles_nested_blocks() {
        let compiled =
            compile("{{#if user}}{{#each user.items}}{{this}}{{/each}}{{else}}none{{/if}}")
                .unwrap();
        let [Node::Block {
            kind,
            body,
            inverse,
            ..
        }] = compiled.nodes()
        else {
            panic!("expected one block");
        };
        assert_eq!(*kind, BlockKind::If);
        assert_eq!(body.len(), 1);
        assert_eq!(inverse, &[Node::Text("none".into())]);
    }

    #[test]
    fn rejects_malformed_nesting() {
        assert!(syntax_message("{{#if a}}x").contains("unclosed block"));
        assert!(syntax_message("{{#if a}}x{{/each}}").contains("mismatched"));
        assert!(syntax_message("x{{/if}}").contains("no matching block"));
        assert!(syntax_message("{{else}}").contains("outside"));
        assert!(syntax_message("{{#if a}}{{else}}{{else}}{{/if}}").contains("duplicate"));
        assert!(syntax_message("{{#with a}}{{/with}}").contains("unknown block helper"));
        assert!(syntax_message("{{#if}}{{/if}}").contains("requires an argument"));
    }

    #[test]
    fn rejects_malformed_tags() {
        assert!(syntax_message("Hello {{name").contains("unterminated"));
        assert!(syntax_message("Hello {{name {{x}}").contains("unterminated"));
        assert!(syntax_message("Hello {{ }}").contains("empty"));
        assert!(syntax_message("{{a..b}}").contains("invalid variable path"));
        assert!(syntax_message("{{>}}").contains("partial"));
        assert!(syntax_message("{{@nope}}").contains("invalid variable path"));
    }

    #[test]
    fn reports_position_of_bad_tag() {
        let err = compile("line one\n  {{#if x}}").unwrap_err();
        assert_eq!(
            err,
            TemplateError::Syntax {
                message: "unclosed block `{{#if x}}`".into(),
                line: 2,
                column: 3,
            }
        );
    }

    #[test]
    fn skips_comments() {
        let compiled = compile("a{{! note }}b{{!-- {{ignored}} --}}c").unwrap();
        assert!(compiled.variables().is_empty());
    }

    #[test]
    fn collects_root_variables() {
        let compiled = compile(
            "{{ name }} {{user.email}} {{#if vip}}{{perk}}{{/if}} \
             {{#each orders}}{{sku}}{{@index}}{{/each}} {{this}} {{> footer}}",
        )
        .unwrap();
        let names: Vec<_> = compiled.variables().into_iter().collect();
        assert_eq!(names, vec!["name", "orders", "perk", "user", "vip"]);
        assert!(compiled.partial_names().contains("footer"));
    }
}
