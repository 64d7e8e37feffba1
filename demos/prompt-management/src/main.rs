//! Example walking through prompt creation, versioning, schemas, and plugins.

use std::sync::Arc;
use std::thread;

use anyhow::{Result, anyhow};
use promptkit::kernel::{PromptPlugin, RenderOptions, RenderedPrompt, TracingObserver};
use promptkit::telemetry::{StatsObserver, TelemetryConfig, init_tracing};
use promptkit::{
    BumpLevel, Field, FieldType, Message, Prompt, PromptFilter, PromptId, PromptManager, Schema,
    Validator, Variables,
};
use serde_json::{Value, json};
use tracing::info;

/// Converts rendered prompts into a chat-completions style request body.
struct ChatRequestPlugin;

impl PromptPlugin for ChatRequestPlugin {
    fn name(&self) -> &str {
        "chat-request"
    }

    fn convert(&self, rendered: &RenderedPrompt) -> Result<Value, String> {
        let messages: Vec<Value> = rendered
            .messages
            .iter()
            .map(|message| json!({"role": message.role.as_str(), "content": message.content}))
            .collect();
        Ok(json!({"messages": messages}))
    }
}

fn vars(value: Value) -> Variables {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&TelemetryConfig::default())?;

    println!("=== promptkit: Prompt Management Example ===\n");

    let stats = Arc::new(StatsObserver::new());
    let manager = PromptManager::builder()
        .schema(review_schema()?)
        .observer(Arc::new(TracingObserver))
        .observer(stats.clone())
        .default_bump(BumpLevel::Minor)
        .created_by("example")
        .plugin(Arc::new(ChatRequestPlugin))
        .build()?;

    demonstrate_rendering(&manager).await?;
    demonstrate_versioning(&manager).await?;
    demonstrate_schemas(&manager).await?;
    demonstrate_blocking(manager.clone())?;

    let names: Vec<_> = manager
        .list_prompts(&PromptFilter::new())
        .iter()
        .map(|prompt| prompt.id().to_string())
        .collect();
    info!(prompts = ?names, stats = ?stats.snapshot(), "example finished");
    Ok(())
}

fn review_schema() -> Result<Schema> {
    Ok(Schema::builder("review_verdict")
        .description("Structured code review verdict")
        .field(
            Field::new("verdict", FieldType::Enum)
                .with_validator(Validator::one_of(["approve", "request_changes"])),
        )
        .field(
            Field::new("comments", FieldType::List)
                .with_item_type(FieldType::String)
                .with_description("One entry per finding"),
        )
        .build()?)
}

async fn demonstrate_rendering(manager: &PromptManager) -> Result<()> {
    println!("--- Example 1: Text and chat prompts ---\n");

    let greeting = Prompt::builder("greeting")
        .text("You are {{role}}. Your task is to {{task}}.{{#if constraints}} {{constraints}}{{/if}}")
        .tag("system")
        .build()?;
    manager.create_prompt(greeting, Some("initial".into())).await?;

    let id = PromptId::new("greeting")?;
    let rendered = manager
        .render(
            &id,
            &vars(json!({"role": "a code reviewer", "task": "review Rust code"})),
            None,
        )
        .await?;
    println!("Rendered template:\n{rendered}\n");

    let support = Prompt::builder("support")
        .message(Message::system("You answer questions about {{product}}."))
        .message(Message::user("{{question}}"))
        .build()?;
    manager.create_prompt(support, None).await?;

    let request = manager
        .render_for_plugin(
            "chat-request",
            &PromptId::new("support")?,
            &vars(json!({"product": "promptkit", "question": "How do versions work?"})),
            None,
        )
        .await?;
    println!("Chat request body:\n{}\n", serde_json::to_string_pretty(&request)?);
    Ok(())
}

async fn demonstrate_versioning(manager: &PromptManager) -> Result<()> {
    println!("--- Example 2: Versioning ---\n");

    let id = PromptId::new("greeting")?;
    let current = manager.get_prompt(&id, None).await?;
    let mut edited = Prompt::builder("greeting")
        .version(current.version().to_string())
        .text("You are {{role}}. Please {{task}} carefully.")
        .tag("system")
        .build()?;
    edited = manager
        .update_prompt(edited, true, Some("tighten wording".into()))
        .await?;
    println!("Bumped to {}", edited.version());

    for entry in manager.get_history(&id).await? {
        println!(
            "  {} (parent {:?}): {}",
            entry.version(),
            entry.parent_version().map(|v| v.to_string()),
            entry.changelog().unwrap_or("-")
        );
    }

    let variables = vars(json!({"role": "a tester", "task": "write tests"}));
    let old = manager
        .render_with(
            &id,
            &variables,
            RenderOptions::at_version(current.version()),
        )
        .await?;
    println!("\nPrevious version still renders:\n{old}\n");
    Ok(())
}

async fn demonstrate_schemas(manager: &PromptManager) -> Result<()> {
    println!("--- Example 3: Output schemas ---\n");

    let review = Prompt::builder("code_review")
        .text("Review this diff:\n{{diff}}")
        .output_schema("review_verdict")
        .build()?;
    manager.create_prompt(review, None).await?;

    let id = PromptId::new("code_review")?;
    let variables = vars(json!({"diff": "- let x = 1;\n+ let x = 2;"}));
    println!("{}\n", manager.render(&id, &variables, None).await?);

    let response = r#"{"verdict": "approve", "comments": ["looks good"]}"#;
    let parsed = manager
        .render_and_parse(&id, &variables, response, None)
        .await?;
    println!("Parsed response: {parsed}");

    match manager
        .render_and_parse(&id, &variables, r#"{"verdict": "maybe"}"#, None)
        .await
    {
        Ok(_) => println!("unexpectedly accepted"),
        Err(err) => {
            println!("Rejected response:");
            for violation in err.violations() {
                println!("  {} -> {}", violation.path, violation.message);
            }
        }
    }
    println!();
    Ok(())
}

fn demonstrate_blocking(manager: PromptManager) -> Result<()> {
    println!("--- Example 4: Blocking calls ---\n");

    // Blocking calls must come from a thread that is not driving a runtime.
    let rendered = thread::spawn(move || {
        let id = PromptId::new("greeting")?;
        let text = manager.blocking().render(
            &id,
            &vars(json!({"role": "a linter", "task": "flag issues"})),
            None,
        )?;
        Ok::<_, anyhow::Error>(text)
    })
    .join()
    .map_err(|_| anyhow!("blocking thread panicked"))??;
    println!("Rendered from a plain thread:\n{rendered}");
    Ok(())
}
