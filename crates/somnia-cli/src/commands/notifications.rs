use std::sync::Arc;

use clap::Subcommand;
use serde_json::json;
use somnia_core::NotificationCenter;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum NotificationsAction {
    /// List notifications, newest first
    List {
        /// Only unread ones
        #[arg(long)]
        unread: bool,
    },
    /// Mark one notification as read
    Read { id: String },
    /// Mark every notification as read
    ReadAll,
    /// Delete all notifications
    Clear,
}

pub fn run(action: NotificationsAction) -> CliResult {
    let ctx = Context::open()?;
    let inbox = NotificationCenter::new(Arc::clone(&ctx.store), Arc::clone(&ctx.clock));

    match action {
        NotificationsAction::List { unread } => {
            let mut all = inbox.list()?;
            if unread {
                all.retain(|n| !n.read);
            }
            print_json(&all)?;
        }
        NotificationsAction::Read { id } => {
            inbox.mark_read(&id)?;
            print_json(&json!({ "read": id, "unread": inbox.unread_count()? }))?;
        }
        NotificationsAction::ReadAll => {
            let marked = inbox.mark_all_read()?;
            print_json(&json!({ "marked": marked }))?;
        }
        NotificationsAction::Clear => {
            let removed = inbox.clear()?;
            print_json(&json!({ "removed": removed }))?;
        }
    }
    Ok(())
}
