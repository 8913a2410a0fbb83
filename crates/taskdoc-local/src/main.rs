use std::path::Path;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use taskdoc_core::{Document, TaskUpdate};
use taskdoc_local::{Command, Config, TaskStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Printed for commands that return no record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Outcome<'a> {
    operation: &'a str,
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cascaded_tasks: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    let options = config.store_options();

    info!("Starting taskdoc");
    info!("  Data file: {}", options.data_file.display());
    info!("  Lock timeout: {:?}", options.lock_timeout);

    let store = TaskStore::open(&options);
    run(&store, config.command).await
}

async fn run(store: &TaskStore, command: Command) -> anyhow::Result<()> {
    match command {
        Command::CreateUser { name, email } => {
            print_json(&store.create_user(&name, &email).await?)
        }
        Command::CreateTask {
            title,
            description,
            category,
            user,
        } => print_json(
            &store
                .create_task(&title, &description, &category, &user)
                .await?,
        ),
        Command::UpdateTask {
            id,
            title,
            description,
            category,
            user,
            status,
        } => {
            let update = TaskUpdate {
                title,
                description,
                category,
                assigned_user_id: user,
                status,
            };
            if update.is_empty() {
                anyhow::bail!("update-task needs at least one field to change");
            }
            print_json(&store.update_task(&id, update).await?)
        }
        Command::CompleteTask { id } => print_json(&store.mark_task_completed(&id).await?),
        Command::DeleteTask { id } => {
            store.delete_task(&id).await?;
            print_json(&Outcome {
                operation: "delete-task",
                id: Some(id.as_str()),
                cascaded_tasks: None,
            })
        }
        Command::DeleteUser { id } => {
            let cascaded = store.delete_user(&id).await?;
            print_json(&Outcome {
                operation: "delete-user",
                id: Some(id.as_str()),
                cascaded_tasks: Some(cascaded),
            })
        }
        Command::Dump => print_json(&store.export_data().await?),
        Command::Import { file } => {
            let document = load_import(&file).await?;
            store.import_data(document).await?;
            print_json(&Outcome {
                operation: "import",
                id: None,
                cascaded_tasks: None,
            })
        }
        Command::LockStatus => print_json(&store.lock_status()),
    }
}

async fn load_import(path: &Path) -> anyhow::Result<Document> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
