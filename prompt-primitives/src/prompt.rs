//! The prompt data model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::{Message, PromptId, Version};

/// Shape of a prompt's content.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptFormat {
    /// A single flat template.
    Text,
    /// An ordered list of role-tagged message templates.
    Chat,
}

/// Advisory lifecycle status. The engine never transitions it on its own.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStatus {
    /// Work in progress.
    #[default]
    Draft,
    /// In use.
    Active,
    /// Superseded but still renderable.
    Deprecated,
    /// Retired.
    Archived,
}

impl PromptStatus {
    /// Returns the lowercase wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Archived => "archived",
        }
    }
}

/// Flat template content with declared variables and named partials.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TextTemplate {
    /// Template source.
    pub content: String,
    /// Variable names the author declares the template uses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
    /// Named partial templates available to `{{> name}}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub partials: BTreeMap<String, String>,
}

impl TextTemplate {
    /// Creates a template from its source text.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Chat content: every message is templated independently.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatTemplate {
    /// Ordered message templates.
    pub messages: Vec<Message>,
    /// Variable names the author declares the messages use.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
    /// Named partial templates shared by all messages.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub partials: BTreeMap<String, String>,
}

impl ChatTemplate {
    /// Creates a chat template from its messages.
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }
}

/// Templated content of a prompt; exactly one representation exists.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PromptContent {
    /// Flat text content.
    Text(TextTemplate),
    /// Chat message content.
    Chat(ChatTemplate),
}

impl PromptContent {
    /// Returns the format matching this content.
    #[must_use]
    pub const fn format(&self) -> PromptFormat {
        match self {
            Self::Text(_) => PromptFormat::Text,
            Self::Chat(_) => PromptFormat::Chat,
        }
    }

    /// Returns the partials declared alongside the content.
    #[must_use]
    pub fn partials(&self) -> &BTreeMap<String, String> {
        match self {
            Self::Text(template) => &template.partials,
            Self::Chat(template) => &template.partials,
        }
    }

    /// Returns the declared variable names.
    #[must_use]
    pub fn declared_variables(&self) -> &[String] {
        match self {
            Self::Text(template) => &template.variables,
            Self::Chat(template) => &template.variables,
        }
    }
}

/// Free-form, non-authoritative descriptive metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptMetadata {
    /// Author of the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Normalised (trimmed, lowercase) tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Grouping category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Arbitrary caller-defined attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, Value>,
}

impl PromptMetadata {
    /// Returns `true` if every supplied tag is present (case-insensitive).
    #[must_use]
    pub fn has_all_tags<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().all(|wanted| {
            let wanted = normalize_tag(wanted.as_ref());
            self.tags.iter().any(|tag| *tag == wanted)
        })
    }

    fn normalize(&mut self) {
        let mut tags = Vec::with_capacity(self.tags.len());
        for tag in self.tags.drain(..) {
            let tag = normalize_tag(&tag);
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        self.tags = tags;
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// A versioned, templated unit of LLM input plus metadata and schema references.
///
/// Instances are always structurally valid: construction goes through
/// [`PromptBuilder`] or deserialisation, both of which enforce the invariants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PromptDocument", into = "PromptDocument")]
pub struct Prompt {
    id: PromptId,
    version: Version,
    content: PromptContent,
    status: PromptStatus,
    metadata: PromptMetadata,
    input_schema: Option<String>,
    output_schema: Option<String>,
}

impl Prompt {
    /// Starts building a prompt with the supplied identifier.
    #[must_use]
    pub fn builder(id: impl Into<String>) -> PromptBuilder {
        PromptBuilder::new(id)
    }

    /// Returns the prompt identifier.
    #[must_use]
    pub fn id(&self) -> &PromptId {
        &self.id
    }

    /// Returns the prompt version.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Returns the content format.
    #[must_use]
    pub const fn format(&self) -> PromptFormat {
        self.content.format()
    }

    /// Returns the templated content.
    #[must_use]
    pub fn content(&self) -> &PromptContent {
        &self.content
    }

    /// Returns the flat template for text prompts.
    #[must_use]
    pub fn template(&self) -> Option<&TextTemplate> {
        match &self.content {
            PromptContent::Text(template) => Some(template),
            PromptContent::Chat(_) => None,
        }
    }

    /// Returns the message templates for chat prompts.
    #[must_use]
    pub fn chat_template(&self) -> Option<&ChatTemplate> {
        match &self.content {
            PromptContent::Chat(template) => Some(template),
            PromptContent::Text(_) => None,
        }
    }

    /// Returns the advisory status.
    #[must_use]
    pub const fn status(&self) -> PromptStatus {
        self.status
    }

    /// Returns the descriptive metadata.
    #[must_use]
    pub fn metadata(&self) -> &PromptMetadata {
        &self.metadata
    }

    /// Returns the name of the schema applied to render variables.
    #[must_use]
    pub fn input_schema(&self) -> Option<&str> {
        self.input_schema.as_deref()
    }

    /// Returns the name of the schema applied to model responses.
    #[must_use]
    pub fn output_schema(&self) -> Option<&str> {
        self.output_schema.as_deref()
    }

    /// Returns every template source owned by this prompt: the body (or each
    /// message body) followed by the partials.
    #[must_use]
    pub fn template_sources(&self) -> Vec<&str> {
        let mut sources = match &self.content {
            PromptContent::Text(template) => vec![template.content.as_str()],
            PromptContent::Chat(template) => template
                .messages
                .iter()
                .map(|message| message.content.as_str())
                .collect(),
        };
        sources.extend(self.content.partials().values().map(String::as_str));
        sources
    }

    /// Replaces the version.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Replaces the status.
    pub fn set_status(&mut self, status: PromptStatus) {
        self.status = status;
    }

    /// Replaces the templated content after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPrompt`] when the new content violates a content
    /// invariant; the prompt is left unchanged in that case.
    pub fn set_content(&mut self, content: PromptContent) -> Result<()> {
        validate_content(self.id.as_str(), &content)?;
        self.content = content;
        Ok(())
    }

    /// Replaces the metadata, normalising tags.
    pub fn set_metadata(&mut self, mut metadata: PromptMetadata) {
        metadata.normalize();
        self.metadata = metadata;
    }

    /// Sets or clears the input schema reference.
    pub fn set_input_schema(&mut self, schema: Option<String>) {
        self.input_schema = schema;
    }

    /// Sets or clears the output schema reference.
    pub fn set_output_schema(&mut self, schema: Option<String>) {
        self.output_schema = schema;
    }
}

/// Builder for [`Prompt`].
#[derive(Debug, Default)]
pub struct PromptBuilder {
    id: String,
    version: Option<String>,
    format: Option<PromptFormat>,
    content: Option<String>,
    messages: Vec<Message>,
    variables: Vec<String>,
    partials: BTreeMap<String, String>,
    status: PromptStatus,
    metadata: PromptMetadata,
    input_schema: Option<String>,
    output_schema: Option<String>,
}

impl PromptBuilder {
    /// Creates a builder for the supplied identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the version string; defaults to `1.0.0`.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Uses flat text content.
    #[must_use]
    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.format = Some(PromptFormat::Text);
        self.content = Some(content.into());
        self
    }

    /// Uses chat content with the supplied messages.
    #[must_use]
    pub fn chat(mut self, messages: Vec<Message>) -> Self {
        self.format = Some(PromptFormat::Chat);
        self.messages = messages;
        self
    }

    /// Appends a chat message, switching the builder to chat format.
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.format = Some(PromptFormat::Chat);
        self.messages.push(message);
        self
    }

    /// Declares a template variable.
    #[must_use]
    pub fn variable(mut self, name: impl Into<String>) -> Self {
        self.variables.push(name.into());
        self
    }

    /// Declares several template variables.
    #[must_use]
    pub fn variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables.extend(names.into_iter().map(Into::into));
        self
    }

    /// Registers a named partial.
    #[must_use]
    pub fn partial(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.partials.insert(name.into(), source.into());
        self
    }

    /// Sets the advisory status.
    #[must_use]
    pub fn status(mut self, status: PromptStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.metadata.author = Some(author.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.metadata.category = Some(category.into());
        self
    }

    /// Replaces the whole metadata block.
    #[must_use]
    pub fn metadata(mut self, metadata: PromptMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// References the schema used to validate render variables.
    #[must_use]
    pub fn input_schema(mut self, name: impl Into<String>) -> Self {
        self.input_schema = Some(name.into());
        self
    }

    /// References the schema used to validate model responses.
    #[must_use]
    pub fn output_schema(mut self, name: impl Into<String>) -> Self {
        self.output_schema = Some(name.into());
        self
    }

    /// Finalises the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPromptId`] or [`Error::InvalidVersion`] for
    /// malformed identifiers, and [`Error::InvalidPrompt`] when no content was
    /// supplied or the content violates an invariant.
    pub fn build(self) -> Result<Prompt> {
        let id = PromptId::new(self.id)?;
        let version = match self.version {
            Some(raw) => Version::parse(&raw)?,
            None => Version::default(),
        };

        let content = match self.format {
            Some(PromptFormat::Text) => PromptContent::Text(TextTemplate {
                content: self.content.unwrap_or_default(),
                variables: self.variables,
                partials: self.partials,
            }),
            Some(PromptFormat::Chat) => PromptContent::Chat(ChatTemplate {
                messages: self.messages,
                variables: self.variables,
                partials: self.partials,
            }),
            None => {
                return Err(Error::invalid_prompt(
                    id.as_str(),
                    "either text or chat content is required",
                ));
            }
        };

        assemble(
            id,
            version,
            content,
            self.status,
            self.metadata,
            self.input_schema,
            self.output_schema,
        )
    }
}

fn assemble(
    id: PromptId,
    version: Version,
    content: PromptContent,
    status: PromptStatus,
    mut metadata: PromptMetadata,
    input_schema: Option<String>,
    output_schema: Option<String>,
) -> Result<Prompt> {
    validate_content(id.as_str(), &content)?;
    for (label, schema) in [("input", &input_schema), ("output", &output_schema)] {
        if schema.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(Error::invalid_prompt(
                id.as_str(),
                format!("{label} schema reference cannot be empty"),
            ));
        }
    }
    metadata.normalize();

    Ok(Prompt {
        id,
        version,
        content,
        status,
        metadata,
        input_schema,
        output_schema,
    })
}

fn validate_content(id: &str, content: &PromptContent) -> Result<()> {
    match content {
        PromptContent::Text(template) => {
            if template.content.trim().is_empty() {
                return Err(Error::invalid_prompt(id, "template content cannot be empty"));
            }
        }
        PromptContent::Chat(template) => {
            if template.messages.is_empty() {
                return Err(Error::invalid_prompt(
                    id,
                    "chat template requires at least one message",
                ));
            }
            if let Some(index) = template
                .messages
                .iter()
                .position(|message| message.content.trim().is_empty())
            {
                return Err(Error::invalid_prompt(
                    id,
                    format!("message {index} has empty content"),
                ));
            }
        }
    }

    if let Some(name) = content
        .declared_variables()
        .iter()
        .find(|name| !is_identifier(name))
    {
        return Err(Error::invalid_prompt(
            id,
            format!("declared variable `{name}` is not a valid identifier"),
        ));
    }

    if let Some(name) = content.partials().keys().find(|name| !is_partial_name(name)) {
        return Err(Error::invalid_prompt(
            id,
            format!("partial name `{name}` is not valid"),
        ));
    }

    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_partial_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'))
}

/// On-the-wire shape of a prompt, mirroring declarative definition files.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct PromptDocument {
    id: String,
    #[serde(default = "default_version")]
    version: String,
    format: PromptFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<TextTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chat_template: Option<ChatTemplate>,
    #[serde(default)]
    status: PromptStatus,
    #[serde(default)]
    metadata: PromptMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_schema: Option<String>,
}

fn default_version() -> String {
    Version::default().to_string()
}

impl TryFrom<PromptDocument> for Prompt {
    type Error = Error;

    fn try_from(doc: PromptDocument) -> Result<Self> {
        let id = PromptId::new(doc.id)?;
        let version = Version::parse(&doc.version)?;
        let content = match (doc.format, doc.template, doc.chat_template) {
            (PromptFormat::Text, Some(template), None) => PromptContent::Text(template),
            (PromptFormat::Chat, None, Some(template)) => PromptContent::Chat(template),
            (PromptFormat::Text, _, _) => {
                return Err(Error::invalid_prompt(
                    id.as_str(),
                    "text prompts require `template` and no `chat_template`",
                ));
            }
            (PromptFormat::Chat, _, _) => {
                return Err(Error::invalid_prompt(
                    id.as_str(),
                    "chat prompts require `chat_template` and no `template`",
                ));
            }
        };

        assemble(
            id,
            version,
            content,
            doc.status,
            doc.metadata,
            doc.input_schema,
            doc.output_schema,
        )
    }
}

impl From<Prompt> for PromptDocument {
    fn from(prompt: Prompt) -> Self {
        let format = prompt.format();
        let (template, chat_template) = match prompt.content {
            PromptContent::Text(template) => (Some(template), None),
            PromptContent::Chat(template) => (None, Some(template)),
        };
        Self {
            id: prompt.id.into(),
            version: prompt.version.to_string(),
            format,
            template,
            chat_template,
            status: prompt.status,
            metadata: prompt.metadata,
            input_schema: prompt.input_schema,
            output_schema: prompt.output_schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Role;

    fn greeting() -> Prompt {
        Prompt::builder("test_greeting")
            .version("1.0.0")
            .text("Hello {{name}}! Welcome to {{service}}.")
            .variables(["name", "service"])
            .author("Test")
            .tag("Greeting")
            .tag("  Onboarding ")
            .tag("")
            .build()
            .unwrap()
    }

    #[test]
    fn builds_text_prompt() {
        let prompt = greeting();
        assert_eq!(prompt.id().as_str(), "test_greeting");
        assert_eq!(prompt.format(), PromptFormat::Text);
        assert!(prompt.template().is_some());
        assert!(prompt.chat_template().is_none());
        assert_eq!(prompt.status(), PromptStatus::Draft);
    }

    #[test]
    fn normalises_tags() {
        assert_eq!(greeting().metadata().tags, vec!["greeting", "onboarding"]);
        assert!(greeting().metadata().has_all_tags(&["GREETING"]));
        assert!(!greeting().metadata().has_all_tags(&["greeting", "billing"]));
    }

    #[test]
    fn builds_chat_prompt() {
        let prompt = Prompt::builder("test_chat")
            .message(Message::system("You help {{company}} customers."))
            .message(Message::user("{{user_query}}"))
            .build()
            .unwrap();
        assert_eq!(prompt.format(), PromptFormat::Chat);
        let chat = prompt.chat_template().unwrap();
        assert_eq!(chat.messages[0].role, Role::System);
        assert_eq!(prompt.template_sources().len(), 2);
    }

    #[test]
    fn rejects_invalid_version_at_creation() {
        let err = Prompt::builder("test")
            .version("invalid")
            .text("Test")
            .build()
            .expect_err("invalid version");
        assert!(matches!(err, Error::InvalidVersion { .. }));
    }

    #[test]
    fn rejects_empty_content_and_bad_variables() {
        let err = Prompt::builder("test").text("   ").build().unwrap_err();
        assert!(matches!(err, Error::InvalidPrompt { .. }));

        let err = Prompt::builder("test")
            .text("Test")
            .variables(["valid", "123invalid"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPrompt { .. }));

        let err = Prompt::builder("test").build().unwrap_err();
        assert!(matches!(err, Error::InvalidPrompt { .. }));
    }

    #[test]
    fn rejects_blank_chat_messages() {
        let err = Prompt::builder("test")
            .message(Message::user("   "))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPrompt { .. }));
    }

    #[test]
    fn document_requires_matching_template() {
        let doc = json!({
            "id": "test",
            "format": "chat",
            "template": {"content": "Test"}
        });
        assert!(serde_json::from_value::<Prompt>(doc).is_err());

        let doc = json!({
            "id": "test",
            "format": "text",
            "chat_template": {"messages": [{"role": "user", "content": "Test"}]}
        });
        assert!(serde_json::from_value::<Prompt>(doc).is_err());
    }

    #[test]
    fn document_round_trips() {
        let prompt = greeting();
        let json = serde_json::to_value(&prompt).unwrap();
        assert_eq!(json["format"], "text");
        assert_eq!(json["version"], "1.0.0");
        assert!(json.get("chat_template").is_none());
        let back: Prompt = serde_json::from_value(json).unwrap();
        assert_eq!(back, prompt);
    }

    #[test]
    fn set_content_keeps_prompt_valid() {
        let mut prompt = greeting();
        let err = prompt
            .set_content(PromptContent::Chat(ChatTemplate::default()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPrompt { .. }));
        assert_eq!(prompt.format(), PromptFormat::Text);

        prompt
            .set_content(PromptContent::Text(TextTemplate::new("Hi {{name}}")))
            .unwrap();
        assert_eq!(prompt.template().unwrap().content, "Hi {{name}}");
    }
}
