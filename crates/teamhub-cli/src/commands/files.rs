use teamhub_core::models::SharedFile;

use crate::cli::FilesCommands;
use crate::commands::common::{
    format_file_lines, open_session, print_outcome, resolve_record_id, SessionOptions,
};
use crate::error::CliError;

pub async fn run_files(command: FilesCommands, options: &SessionOptions) -> Result<(), CliError> {
    match command {
        FilesCommands::Add {
            name,
            size,
            mime,
            uploaded_by,
            url,
        } => run_files_add(&name, size, &mime, &uploaded_by, url, options).await,
        FilesCommands::List { json } => run_files_list(json, options).await,
        FilesCommands::Rm { id } => run_files_rm(&id, options).await,
    }
}

pub async fn run_files_add(
    name: &str,
    size: i64,
    mime: &str,
    uploaded_by: &str,
    url: Option<String>,
    options: &SessionOptions,
) -> Result<(), CliError> {
    let mut file = SharedFile::new(name, size, mime, uploaded_by)?;
    if let Some(url) = url {
        file = file.with_url(url);
    }

    let session = open_session(options).await?;
    let applied = session.orchestrator.add_file(file).await;
    print_outcome(&applied.record.id, applied.outcome);
    Ok(())
}

pub async fn run_files_list(as_json: bool, options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let files = session.orchestrator.files().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&files)?);
    } else if files.is_empty() {
        println!("No files shared yet.");
    } else {
        for line in format_file_lines(&files) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_files_rm(id: &str, options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let files = session.orchestrator.files().await;
    let id = resolve_record_id(id, &files)?;

    let outcome = session.orchestrator.delete_file(&id).await?;
    print_outcome(&id, outcome);
    Ok(())
}
