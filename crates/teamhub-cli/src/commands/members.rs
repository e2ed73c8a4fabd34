use teamhub_core::models::{MemberPatch, MemberRole, MemberStatus};

use crate::cli::MembersCommands;
use crate::commands::common::{
    format_member_lines, open_session, print_outcome, resolve_record_id, SessionOptions,
};
use crate::error::CliError;

pub async fn run_members(
    command: MembersCommands,
    options: &SessionOptions,
) -> Result<(), CliError> {
    match command {
        MembersCommands::List { json } => run_members_list(json, options).await,
        MembersCommands::Add { name, email, role } => {
            run_members_add(&name, &email, &role, options).await
        }
        MembersCommands::Update {
            id,
            name,
            email,
            role,
            status,
        } => {
            let patch = build_member_patch(name, email, role.as_deref(), status.as_deref())?;
            run_members_update(&id, patch, options).await
        }
        MembersCommands::Rm { id } => run_members_rm(&id, options).await,
    }
}

pub fn build_member_patch(
    name: Option<String>,
    email: Option<String>,
    role: Option<&str>,
    status: Option<&str>,
) -> Result<MemberPatch, CliError> {
    let patch = MemberPatch {
        name,
        email,
        role: role.map(str::parse::<MemberRole>).transpose()?,
        status: status.map(str::parse::<MemberStatus>).transpose()?,
    };
    if patch.is_empty() {
        return Err(CliError::EmptyUpdate);
    }
    Ok(patch)
}

pub async fn run_members_list(as_json: bool, options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let members = session.orchestrator.members().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&members)?);
    } else {
        for line in format_member_lines(&members) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_members_add(
    name: &str,
    email: &str,
    role: &str,
    options: &SessionOptions,
) -> Result<(), CliError> {
    let role = role.parse::<MemberRole>()?;

    let session = open_session(options).await?;
    let applied = session.orchestrator.add_member(name, email, role).await?;
    print_outcome(&applied.record.id, applied.outcome);
    Ok(())
}

pub async fn run_members_update(
    id: &str,
    patch: MemberPatch,
    options: &SessionOptions,
) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let members = session.orchestrator.members().await;
    let id = resolve_record_id(id, &members)?;

    let applied = session.orchestrator.update_member(&id, patch).await?;
    print_outcome(&applied.record.id, applied.outcome);
    Ok(())
}

pub async fn run_members_rm(id: &str, options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let members = session.orchestrator.members().await;
    let id = resolve_record_id(id, &members)?;

    let outcome = session.orchestrator.remove_member(&id).await?;
    print_outcome(&id, outcome);
    Ok(())
}
