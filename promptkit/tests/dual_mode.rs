use std::fmt::Debug;
use std::future::Future;

use promptkit::{
    ErrorKind, Field, FieldType, Prompt, PromptError, PromptId, PromptManager, PromptResult,
    Schema, Validator, Variables, Version,
};
use serde_json::{Value, json};

fn vars(value: Value) -> Variables {
    value.as_object().cloned().unwrap_or_default()
}

fn manager() -> PromptManager {
    let schema = Schema::builder("age_input")
        .field(Field::new("age", FieldType::Integer).with_validator(Validator::range(13.0, 120.0)))
        .build()
        .unwrap();
    PromptManager::builder().schema(schema).build().unwrap()
}

fn seed(manager: &PromptManager) {
    let greeting = Prompt::builder("greeting")
        .text("Hello {{name}}!")
        .build()
        .unwrap();
    let gated = Prompt::builder("gated")
        .text("Age {{age}}")
        .input_schema("age_input")
        .build()
        .unwrap();
    manager.blocking().create_prompt(greeting, None).unwrap();
    manager.blocking().create_prompt(gated, None).unwrap();
}

/// Runs the same operation through the blocking view of one manager and the
/// async API of an identically seeded second manager.
fn assert_equivalent<T, B, A, Fut>(blocking: B, suspending: A)
where
    T: PartialEq + Debug,
    B: FnOnce(&PromptManager) -> PromptResult<T>,
    A: FnOnce(PromptManager) -> Fut,
    Fut: Future<Output = PromptResult<T>>,
{
    let sync_manager = manager();
    seed(&sync_manager);
    let blocking_result = blocking(&sync_manager);

    let async_manager = manager();
    seed(&async_manager);
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let suspending_result = runtime.block_on(suspending(async_manager));

    match (blocking_result, suspending_result) {
        (Ok(left), Ok(right)) => assert_eq!(left, right),
        (Err(left), Err(right)) => {
            assert_eq!(left.kind(), right.kind());
            assert_eq!(left, right);
        }
        (left, right) => panic!("modes disagree: {left:?} vs {right:?}"),
    }
}

#[test]
fn render_matches() {
    let id = PromptId::new("greeting").unwrap();
    let v = vars(json!({"name": "Alice"}));
    assert_equivalent(
        |m| m.blocking().render(&id, &v, None),
        |m| {
            let (id, v) = (id.clone(), v.clone());
            async move { m.render(&id, &v, None).await }
        },
    );
}

#[test]
fn schema_failures_match() {
    let id = PromptId::new("gated").unwrap();
    let v = vars(json!({"age": 200}));
    assert_equivalent(
        |m| m.blocking().render(&id, &v, None),
        |m| {
            let (id, v) = (id.clone(), v.clone());
            async move { m.render(&id, &v, None).await }
        },
    );
}

#[test]
fn missing_prompt_matches() {
    let id = PromptId::new("ghost").unwrap();
    assert_equivalent(
        |m| m.blocking().get_prompt(&id, None),
        |m| {
            let id = id.clone();
            async move { m.get_prompt(&id, None).await }
        },
    );
}

#[test]
fn duplicate_create_matches() {
    let duplicate = || {
        Prompt::builder("greeting")
            .text("Hello again")
            .build()
            .unwrap()
    };
    assert_equivalent(
        |m| m.blocking().create_prompt(duplicate(), None),
        |m| async move { m.create_prompt(duplicate(), None).await },
    );
}

#[test]
fn bump_and_history_match() {
    let id = PromptId::new("greeting").unwrap();
    let bump_then_versions = |m: &PromptManager| -> PromptResult<Vec<Version>> {
        let sync = m.blocking();
        let current = sync.get_prompt(&id, None)?;
        sync.update_prompt(current, true, Some("tweak".into()))?;
        Ok(sync
            .get_history(&id)?
            .iter()
            .map(promptkit::PromptVersion::version)
            .collect())
    };
    let id_async = id.clone();
    assert_equivalent(bump_then_versions, |m| async move {
        let current = m.get_prompt(&id_async, None).await?;
        m.update_prompt(current, true, Some("tweak".into())).await?;
        Ok(m
            .get_history(&id_async)
            .await?
            .iter()
            .map(promptkit::PromptVersion::version)
            .collect())
    });
}

#[test]
fn response_parsing_matches() {
    let id = PromptId::new("greeting").unwrap();
    let v = vars(json!({"name": "Alice"}));
    assert_equivalent(
        |m| m.blocking().render_and_parse(&id, &v, "{not json", None),
        |m| {
            let (id, v) = (id.clone(), v.clone());
            async move { m.render_and_parse(&id, &v, "{not json", None).await }
        },
    );
}

#[tokio::test]
async fn blocking_view_refuses_to_nest() {
    let manager = manager();
    seed_async(&manager).await;
    let id = PromptId::new("greeting").unwrap();

    let err = manager
        .blocking()
        .render(&id, &vars(json!({"name": "Alice"})), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NestedScheduler);
    assert_eq!(err, PromptError::NestedScheduler { operation: "render" });

    // The suspending path is unaffected.
    assert_eq!(
        manager
            .render(&id, &vars(json!({"name": "Alice"})), None)
            .await
            .unwrap(),
        "Hello Alice!"
    );
}

async fn seed_async(manager: &PromptManager) {
    let greeting = Prompt::builder("greeting")
        .text("Hello {{name}}!")
        .build()
        .unwrap();
    manager.create_prompt(greeting, None).await.unwrap();
}
