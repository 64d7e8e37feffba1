use promptkit::template::TemplateConfig;
use promptkit::{
    BumpLevel, Field, FieldType, Prompt, PromptError, PromptId, PromptManager, Schema, Validator,
    Variables, Version,
};
use serde_json::{Value, json};

fn vars(value: Value) -> Variables {
    value.as_object().cloned().unwrap_or_default()
}

fn id(raw: &str) -> PromptId {
    PromptId::new(raw).unwrap()
}

#[tokio::test]
async fn renders_a_simple_greeting() {
    let manager = PromptManager::builder().build().unwrap();
    let prompt = Prompt::builder("greeting")
        .text("Hello {{name}}!")
        .build()
        .unwrap();
    manager.create_prompt(prompt, None).await.unwrap();

    let rendered = manager
        .render(&id("greeting"), &vars(json!({"name": "Alice"})), None)
        .await
        .unwrap();
    assert_eq!(rendered, "Hello Alice!");
}

#[tokio::test]
async fn input_schema_rejects_out_of_range_age() {
    let schema = Schema::builder("user_input")
        .field(Field::new("age", FieldType::Integer).with_validator(Validator::range(13.0, 120.0)))
        .build()
        .unwrap();
    let manager = PromptManager::builder().schema(schema).build().unwrap();
    let prompt = Prompt::builder("signup")
        .text("Age: {{age}}")
        .input_schema("user_input")
        .build()
        .unwrap();
    manager.create_prompt(prompt, None).await.unwrap();

    let err = manager
        .render(&id("signup"), &vars(json!({"age": 200})), None)
        .await
        .unwrap_err();
    let PromptError::SchemaValidation {
        prompt_id,
        schema,
        violations,
    } = err
    else {
        panic!("unexpected error {err:?}");
    };
    assert_eq!(prompt_id, Some(id("signup")));
    assert_eq!(schema, "user_input");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].path, "age");
    assert_eq!(violations[0].constraint, "range[13,120]");
    assert_eq!(violations[0].actual, json!(200));
}

#[tokio::test]
async fn creating_the_same_version_twice_fails() {
    let manager = PromptManager::builder().build().unwrap();
    let prompt = || {
        Prompt::builder("x")
            .version("1.0.0")
            .text("body")
            .build()
            .unwrap()
    };
    manager.create_prompt(prompt(), None).await.unwrap();

    let err = manager.create_prompt(prompt(), None).await.unwrap_err();
    assert_eq!(
        err,
        PromptError::DuplicateVersion {
            id: id("x"),
            version: Version::new(1, 0, 0),
        }
    );
}

#[tokio::test]
async fn minor_bump_appends_history() {
    let manager = PromptManager::builder()
        .default_bump(BumpLevel::Minor)
        .build()
        .unwrap();
    let prompt = Prompt::builder("greeting")
        .version("1.0.0")
        .text("Helo {{name}}")
        .build()
        .unwrap();
    let created = manager.create_prompt(prompt, None).await.unwrap();

    let updated = manager
        .update_prompt(created, true, Some("fix typo".to_owned()))
        .await
        .unwrap();
    assert_eq!(updated.version(), Version::new(1, 1, 0));

    let history = manager.get_history(&id("greeting")).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].changelog(), Some("fix typo"));
}

#[tokio::test]
async fn strict_mode_rejects_missing_variables() {
    let manager = PromptManager::builder()
        .template_config(TemplateConfig::new().with_strict(true))
        .build()
        .unwrap();
    let prompt = Prompt::builder("gap")
        .text("Value: {{missing}}")
        .build()
        .unwrap();
    manager.create_prompt(prompt, None).await.unwrap();

    let err = manager
        .render(&id("gap"), &Variables::new(), None)
        .await
        .unwrap_err();
    assert!(
        matches!(err, PromptError::TemplateRender { ref id, .. } if id.as_str() == "gap"),
        "unexpected error {err:?}"
    );
}

#[tokio::test]
async fn output_schema_round_trip() {
    let verdict = Schema::builder("verdict")
        .field(
            Field::new("sentiment", FieldType::Enum)
                .with_validator(Validator::one_of(["positive", "negative", "neutral"])),
        )
        .field(Field::new("confidence", FieldType::Float).with_validator(Validator::range(0.0, 1.0)))
        .build()
        .unwrap();
    let manager = PromptManager::builder().schema(verdict).build().unwrap();
    let prompt = Prompt::builder("classify")
        .text("Classify: {{text}}")
        .output_schema("verdict")
        .build()
        .unwrap();
    manager.create_prompt(prompt, None).await.unwrap();

    let vars = vars(json!({"text": "great product"}));
    let rendered = manager.render(&id("classify"), &vars, None).await.unwrap();
    assert!(rendered.starts_with("Classify: great product\n\n# Output Requirements"));

    let raw = "```json\n{\"sentiment\": \"positive\", \"confidence\": 0.9}\n```";
    let parsed = manager
        .render_and_parse(&id("classify"), &vars, raw, None)
        .await
        .unwrap();
    assert_eq!(parsed["sentiment"], "positive");

    let err = manager
        .render_and_parse(&id("classify"), &vars, "no json here", None)
        .await
        .unwrap_err();
    assert!(matches!(err, PromptError::ResponseParse { .. }), "{err:?}");

    let err = manager
        .render_and_parse(
            &id("classify"),
            &vars,
            r#"{"sentiment": "angry", "confidence": 3}"#,
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.violations().len(), 2);
}
