use std::fs;

use chrono::{Duration, Utc};
use promptkit::config::{DocumentFormat, ManagerConfig, StorageBackend, load_definitions};
use promptkit::{Prompt, PromptError, PromptId, PromptManager, Variables, Version};
use serde_json::json;

fn file_config(root: &std::path::Path) -> ManagerConfig {
    let mut config = ManagerConfig::default();
    config.storage.backend = StorageBackend::File;
    config.storage.path = Some(root.to_path_buf());
    config.versioning.created_by = Some("ci".to_owned());
    config
}

#[tokio::test]
async fn file_backend_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());
    let id = PromptId::new("greeting").unwrap();

    {
        let manager = PromptManager::from_config(&config).await.unwrap();
        let created = manager
            .create_prompt(
                Prompt::builder("greeting").text("Hello {{name}}").build().unwrap(),
                Some("initial".into()),
            )
            .await
            .unwrap();
        let mut next = created;
        next.set_content(promptkit::primitives::PromptContent::Text(
            promptkit::primitives::TextTemplate::new("Hi {{name}}"),
        ))
        .unwrap();
        manager.update_prompt(next, true, None).await.unwrap();
    }

    let reopened = PromptManager::from_config(&config).await.unwrap();
    let vars = json!({"name": "Ada"}).as_object().cloned().unwrap();
    assert_eq!(reopened.render(&id, &vars, None).await.unwrap(), "Hi Ada");
    assert_eq!(
        reopened
            .render(&id, &vars, Some(Version::new(1, 0, 0)))
            .await
            .unwrap(),
        "Hello Ada"
    );

    let history = reopened.get_history(&id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|entry| entry.created_by() == Some("ci")));
    assert_eq!(history[0].changelog(), Some("initial"));

    let within = reopened
        .get_history_between(&id, Some(Utc::now() - Duration::hours(1)), None)
        .await
        .unwrap();
    assert_eq!(within.len(), 2);
    let future_only = reopened
        .get_history_between(&id, Some(Utc::now() + Duration::hours(1)), None)
        .await
        .unwrap();
    assert!(future_only.is_empty());
}

#[tokio::test]
async fn deleted_prompts_stay_deleted_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());
    let id = PromptId::new("temp").unwrap();

    let manager = PromptManager::from_config(&config).await.unwrap();
    manager
        .create_prompt(Prompt::builder("temp").text("x").build().unwrap(), None)
        .await
        .unwrap();
    manager.delete_prompt(&id).await.unwrap();
    drop(manager);

    let reopened = PromptManager::from_config(&config).await.unwrap();
    assert!(matches!(
        reopened.get_prompt(&id, None).await,
        Err(PromptError::PromptNotFound { .. })
    ));
    assert_eq!(reopened.get_history(&id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn definitions_import_once() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("schemas.yaml"),
        "schemas:\n  - name: ticket\n    fields:\n      - {name: subject, type: string}\n      - {name: priority, type: integer, required: false, default: 3}\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("triage.json"),
        r#"{"id": "triage", "version": "1.2.0", "format": "text",
            "template": {"content": "[P{{priority}}] {{subject}}"},
            "input_schema": "ticket"}"#,
    )
    .unwrap();

    let definitions = load_definitions(dir.path()).unwrap();
    let manager = PromptManager::builder().build().unwrap();
    assert_eq!(manager.import_definitions(definitions.clone()).await.unwrap(), 1);
    assert_eq!(manager.import_definitions(definitions).await.unwrap(), 0);

    let id = PromptId::new("triage").unwrap();
    let vars = json!({"subject": "Login broken"}).as_object().cloned().unwrap();
    assert_eq!(
        manager.render(&id, &vars, None).await.unwrap(),
        "[P3] Login broken"
    );
    assert_eq!(
        manager.latest_version(&id).await.unwrap().version(),
        Version::new(1, 2, 0)
    );
}

#[tokio::test]
async fn render_cache_from_config() {
    let config = ManagerConfig::from_str_with(
        "render:\n  cache_enabled: true\n  cache_capacity: 4\n",
        DocumentFormat::Yaml,
    )
    .unwrap();
    let stats = std::sync::Arc::new(promptkit::telemetry::StatsObserver::new());
    let manager = PromptManager::builder()
        .config(&config)
        .unwrap()
        .observer(stats.clone())
        .build()
        .unwrap();
    manager
        .create_prompt(Prompt::builder("c").text("cached").build().unwrap(), None)
        .await
        .unwrap();

    let id = PromptId::new("c").unwrap();
    for _ in 0..3 {
        manager.render(&id, &Variables::new(), None).await.unwrap();
    }
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.renders_completed, 3);
    assert_eq!(snapshot.cache_hits, 2);
    assert_eq!(snapshot.versions_created, 1);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let mut config = ManagerConfig::default();
    config.storage.backend = StorageBackend::File;
    let err = PromptManager::from_config(&config).await.unwrap_err();
    assert!(matches!(err, PromptError::Config { .. }), "{err:?}");
}
