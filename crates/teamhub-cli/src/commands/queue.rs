use crate::commands::common::{
    format_queue_lines, open_session, queue_item_to_list_item, QueueListItem, SessionOptions,
};
use crate::error::CliError;

pub async fn run_queue(as_json: bool, options: &SessionOptions) -> Result<(), CliError> {
    let session = open_session(options).await?;
    let items = session.orchestrator.pending_ops().await?;

    if as_json {
        let json_items = items
            .iter()
            .map(queue_item_to_list_item)
            .collect::<Vec<QueueListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No changes waiting to sync.");
        return Ok(());
    }

    for line in format_queue_lines(&items) {
        println!("{line}");
    }
    Ok(())
}
