//! `metaloop prompt`: inspect prompt state.

use anyhow::Result;
use console::style;

use crate::cli::PromptCommand;
use crate::state::AppState;

pub async fn handle_prompt_command(state: &AppState, action: PromptCommand, json: bool) -> Result<()> {
    let store = state.prompt_store();
    match action {
        PromptCommand::Show => {
            let system = store.system_prompt().await?;
            if json {
                let state = store.load().await?;
                let value = serde_json::json!({
                    "system_prompt": system,
                    "patterns": state.patterns,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{system}");
            }
        }
        PromptCommand::Backups => {
            let keys = store.list_quality_backups().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&keys)?);
            } else if keys.is_empty() {
                println!("  {}", style("No quality backups yet.").dim());
            } else {
                for key in keys {
                    println!("  {key}");
                }
            }
        }
        PromptCommand::Backup { key } => {
            let backup = store.read_quality_backup(&key).await?;
            if json {
                let value = serde_json::json!({ "key": backup.key, "content": backup.content });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", backup.content);
            }
        }
    }
    Ok(())
}
