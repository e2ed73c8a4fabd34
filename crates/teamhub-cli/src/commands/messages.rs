use crate::cli::MessagesCommands;
use crate::commands::common::{
    format_message_lines, open_session, print_outcome, resolve_message_content,
    resolve_record_id, SessionOptions,
};
use crate::error::CliError;

pub async fn run_messages(
    command: MessagesCommands,
    options: &SessionOptions,
) -> Result<(), CliError> {
    match command {
        MessagesCommands::Send { content, sender } => {
            run_messages_send(&content, &sender, options).await
        }
        MessagesCommands::List { limit, json } => run_messages_list(limit, json, options).await,
        MessagesCommands::Edit { id, content } => run_messages_edit(&id, &content, options).await,
        MessagesCommands::Rm { id } => run_messages_rm(&id, options).await,
    }
}

pub async fn run_messages_send(
    content_parts: &[String],
    sender: &str,
    options: &SessionOptions,
) -> Result<(), CliError> {
    let content = resolve_message_content(content_parts)?;

    let session = open_session(options).await?;
    let applied = session.orchestrator.send_message(sender, content).await?;
    print_outcome(&applied.record.id, applied.outcome);
    Ok(())
}

pub async fn run_messages_list(
    limit: usize,
    as_json: bool,
    options: &SessionOptions,
) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let messages = session.orchestrator.messages().await;
    // Chat order is oldest first; show the tail
    let recent = &messages[messages.len().saturating_sub(limit)..];

    if as_json {
        println!("{}", serde_json::to_string_pretty(recent)?);
    } else {
        for line in format_message_lines(recent) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_messages_edit(
    id: &str,
    content_parts: &[String],
    options: &SessionOptions,
) -> Result<(), CliError> {
    let content = resolve_message_content(content_parts)?;

    let session = open_session(options).await?;
    let messages = session.orchestrator.messages().await;
    let id = resolve_record_id(id, &messages)?;

    let applied = session.orchestrator.edit_message(&id, content).await?;
    print_outcome(&applied.record.id, applied.outcome);
    Ok(())
}

pub async fn run_messages_rm(id: &str, options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let messages = session.orchestrator.messages().await;
    let id = resolve_record_id(id, &messages)?;

    let outcome = session.orchestrator.delete_message(&id).await?;
    print_outcome(&id, outcome);
    Ok(())
}
