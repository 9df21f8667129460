use std::error::Error;

use clap::Subcommand;
use somnia_core::journal::{parse_tags, BackendSelector};
use somnia_core::{Clock, EntryDraft, EntryPatch, Event, JournalSync, Mood, SleepQuality};

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum JournalAction {
    /// Record a dream
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Emoji or name: happy, peaceful, excited, neutral, confused, sad, scared
        #[arg(long)]
        mood: Mood,
        /// Poor, Fair, Good, Great or Excellent
        #[arg(long)]
        quality: SleepQuality,
        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,
    },
    /// List entries, newest first
    List,
    /// Show one entry
    Show { id: String },
    /// Change fields of an entry
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        mood: Option<Mood>,
        #[arg(long)]
        quality: Option<SleepQuality>,
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete an entry
    Delete { id: String },
    /// Dream count, streak, recall rate and distributions
    Stats,
}

/// The CLI has no signed-in user, so the journal runs in local mode.
fn open_journal(ctx: &Context) -> Result<JournalSync, Box<dyn Error>> {
    Ok(JournalSync::start(
        BackendSelector::local_only(std::sync::Arc::clone(&ctx.store)),
        std::sync::Arc::clone(&ctx.clock),
        ctx.config.journal.clone(),
        None,
    )?)
}

pub fn run(action: JournalAction) -> CliResult {
    let ctx = Context::open()?;
    let journal = open_journal(&ctx)?;

    match action {
        JournalAction::Add {
            title,
            description,
            mood,
            quality,
            tags,
        } => {
            let draft = EntryDraft::new(title, description, mood, quality).with_tags(&tags);
            let id = journal.add_entry(&draft)?;
            print_json(&Event::JournalEntryAdded {
                id: id.clone(),
                at: ctx.clock.now(),
            })?;
            print_json(&journal.require_entry(&id)?)?;
        }
        JournalAction::List => print_json(&journal.entries())?,
        JournalAction::Show { id } => print_json(&journal.require_entry(&id)?)?,
        JournalAction::Update {
            id,
            title,
            description,
            mood,
            quality,
            tags,
        } => {
            let patch = EntryPatch {
                title,
                description,
                mood,
                sleep_quality: quality,
                tags: tags.as_deref().map(parse_tags),
            };
            if patch.is_empty() {
                return Err("nothing to update".into());
            }
            journal.update_entry(&id, &patch)?;
            print_json(&Event::JournalEntryUpdated {
                id: id.clone(),
                at: ctx.clock.now(),
            })?;
            print_json(&journal.require_entry(&id)?)?;
        }
        JournalAction::Delete { id } => {
            journal.delete_entry(&id)?;
            print_json(&Event::JournalEntryDeleted {
                id,
                at: ctx.clock.now(),
            })?;
        }
        JournalAction::Stats => print_json(&journal.stats())?,
    }
    Ok(())
}
