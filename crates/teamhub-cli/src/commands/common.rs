use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use teamhub_core::config::{AppConfig, SyncSettings};
use teamhub_core::connectivity::{ConnectivityMonitor, HttpProbeSource};
use teamhub_core::models::{
    ChatMessage, Record, RecordId, SharedFile, SyncQueueItem, TeamMember,
};
use teamhub_core::notify::{Notice, Notifier};
use teamhub_core::remote::{PostgrestRemote, RemoteStore, UnconfiguredRemote};
use teamhub_core::services::LocalStore;
use teamhub_core::sync::{MutationOutcome, StartReport, SyncContext, SyncOrchestrator, SyncReport};

use crate::error::CliError;

const SHORT_ID_LEN: usize = 16;

/// Where the CLI keeps its data and how it reaches the server
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub db_path: PathBuf,
    pub config: AppConfig,
    pub offline: bool,
}

impl SessionOptions {
    /// Flag, then `TEAMHUB_*` environment, then profile file, then defaults.
    pub fn resolve(
        cli_db_path: Option<PathBuf>,
        cli_config_path: Option<PathBuf>,
        offline: bool,
    ) -> Result<Self, CliError> {
        let config_path = cli_config_path.unwrap_or_else(default_config_path);
        let config = AppConfig::load_file(&config_path)?.with_env_overrides()?;
        let db_path = cli_db_path
            .or_else(|| config.db_path.clone())
            .unwrap_or_else(default_db_path);

        Ok(Self {
            db_path,
            config,
            offline,
        })
    }
}

/// A started orchestrator for one command
pub struct Session {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub start: StartReport,
}

/// Prints notices to stderr so stdout stays parseable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("{}", format_notice(&notice));
    }
}

pub fn format_notice(notice: &Notice) -> String {
    match notice.description.as_deref() {
        Some(description) => format!(
            "[{}] {}: {description}",
            notice.level.as_str(),
            notice.title
        ),
        None => format!("[{}] {}", notice.level.as_str(), notice.title),
    }
}

pub async fn open_session(options: &SessionOptions) -> Result<Session, CliError> {
    let settings = options.config.sync_settings();

    let store = match LocalStore::open_path(options.db_path.clone()).await {
        Ok(store) => store,
        Err(error) => {
            tracing::error!(
                "Failed to open local store at {}: {error}",
                options.db_path.display()
            );
            LocalStore::detached()
        }
    };

    let remote: Arc<dyn RemoteStore> = if options.config.remote.is_configured() {
        Arc::new(PostgrestRemote::new(
            &options.config.remote,
            settings.http_timeout,
        )?)
    } else {
        Arc::new(UnconfiguredRemote)
    };

    let online = detect_online(options, &settings).await;
    let ctx = SyncContext::new(store, remote, ConnectivityMonitor::new(online))
        .with_notifier(Arc::new(ConsoleNotifier))
        .with_settings(settings);

    let orchestrator = Arc::new(SyncOrchestrator::new(ctx));
    let start = orchestrator.start().await;
    Ok(Session {
        orchestrator,
        start,
    })
}

async fn detect_online(options: &SessionOptions, settings: &SyncSettings) -> bool {
    if options.offline {
        return false;
    }
    let Some(url) = options.config.remote.rest_url() else {
        return true;
    };

    match HttpProbeSource::new(url, settings.probe_interval, settings.http_timeout) {
        Ok(mut probe) => probe.probe_now().await,
        Err(error) => {
            tracing::warn!("Failed to build connectivity probe: {error}");
            false
        }
    }
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("teamhub")
        .join("teamhub.db")
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(env::temp_dir)
        .join("teamhub")
        .join("config.json")
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Message text from arguments, falling back to piped stdin.
pub fn resolve_message_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }
    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }
    Err(CliError::EmptyContent)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

/// Match a full id or a unique id prefix against `records`.
pub fn resolve_record_id<R: Record>(query: &str, records: &[R]) -> Result<RecordId, CliError> {
    let query = normalize_identifier(query)?;

    if let Some(record) = records.iter().find(|record| record.id().to_string() == query) {
        return Ok(record.id().clone());
    }

    let matching = records
        .iter()
        .filter(|record| record.id().to_string().starts_with(&query))
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::NotFound {
            kind: R::KIND.as_str(),
            query,
        }),
        [record] => Ok(record.id().clone()),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|record| short_id(record.id()))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &RecordId) -> String {
    id.to_string().chars().take(SHORT_ID_LEN).collect()
}

pub const fn outcome_label(outcome: MutationOutcome) -> &'static str {
    match outcome {
        MutationOutcome::Synced => "synced",
        MutationOutcome::Queued => "saved locally, will sync when online",
        MutationOutcome::LocalOnly => "saved locally",
        MutationOutcome::MemoryOnly => "not saved: local storage unavailable",
    }
}

pub fn print_outcome(id: &RecordId, outcome: MutationOutcome) {
    println!("{id}  ({})", outcome_label(outcome));
}

pub fn format_size(bytes: i64) -> String {
    const KIB: i64 = 1024;
    const MIB: i64 = 1024 * KIB;

    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{} KB", bytes / KIB)
    } else {
        format!("{} MB", bytes / MIB)
    }
}

pub fn format_file_lines(files: &[SharedFile]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    files
        .iter()
        .map(|file| {
            format!(
                "{:<16}  {:<32}  {:>8}  {:<12}  {}",
                short_id(&file.id),
                file.name,
                format_size(file.size_bytes),
                file.uploaded_by,
                format_relative_time(file.created_at, now_ms)
            )
        })
        .collect()
}

pub fn format_message_lines(messages: &[ChatMessage]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    messages
        .iter()
        .map(|message| {
            let edited = if message.edited_at.is_some() {
                " (edited)"
            } else {
                ""
            };
            format!(
                "{:<16}  {:<12}  {:<48}  {}{edited}",
                short_id(&message.id),
                message.sender,
                message.preview(48),
                format_relative_time(message.created_at, now_ms)
            )
        })
        .collect()
}

pub fn format_member_lines(members: &[TeamMember]) -> Vec<String> {
    members
        .iter()
        .map(|member| {
            format!(
                "{:<16}  {:<20}  {:<32}  {:<6}  {}",
                short_id(&member.id),
                member.name,
                member.email,
                member.role.as_str(),
                member.status.as_str()
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct QueueListItem {
    pub seq: i64,
    pub op: &'static str,
    pub kind: &'static str,
    pub target: String,
    pub attempts: u32,
    pub queued_at: i64,
    pub relative_time: String,
}

pub fn queue_item_to_list_item(item: &SyncQueueItem) -> QueueListItem {
    let now_ms = Utc::now().timestamp_millis();
    QueueListItem {
        seq: item.seq,
        op: item.op.label(),
        kind: item.op.kind().as_str(),
        target: item.op.target_id().to_string(),
        attempts: item.attempts,
        queued_at: item.timestamp,
        relative_time: format_relative_time(item.timestamp, now_ms),
    }
}

pub fn format_queue_lines(items: &[SyncQueueItem]) -> Vec<String> {
    items
        .iter()
        .map(queue_item_to_list_item)
        .map(|item| {
            let retries = if item.attempts > 0 {
                format!("  failed {}x", item.attempts)
            } else {
                String::new()
            };
            format!(
                "#{:<5} {:<16}  {:<16}  {}{retries}",
                item.seq,
                item.op,
                item.target.chars().take(SHORT_ID_LEN).collect::<String>(),
                item.relative_time
            )
        })
        .collect()
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    let drain = &report.drain;
    let mut lines = vec![format!("Replayed {} queued changes", drain.replayed)];

    for failed in &drain.failed {
        lines.push(format!(
            "  failed #{} {}: {}",
            failed.seq,
            failed.op.label(),
            failed.error
        ));
    }
    if drain.dropped > 0 {
        lines.push(format!("Discarded {} failed changes", drain.dropped));
    }
    if drain.skipped > 0 {
        lines.push(format!(
            "Skipped {} changes to records never synced",
            drain.skipped
        ));
    }
    if !report.refreshed.is_empty() {
        let tables = report
            .refreshed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Refreshed {tables}"));
    }
    for error in &report.fetch_errors {
        lines.push(format!("  fetch failed: {error}"));
    }
    lines
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}
