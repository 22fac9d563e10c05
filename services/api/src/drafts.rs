use std::sync::Arc;

use admission_portal::config::AppConfig;
use admission_portal::error::AppError;
use admission_portal::telemetry;
use admission_portal::workflows::admission::{
    DocumentKey, DraftId, DraftStore, FileFallbackCache, OwnerId, PortalClient,
};
use clap::{Args, Subcommand};

#[derive(Args, Debug, Default)]
pub(crate) struct UserArgs {
    /// Act as this user instead of the one PORTAL_API_TOKEN signs in as
    #[arg(long)]
    pub(crate) user: Option<String>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum DraftsCommand {
    /// List drafts, newest first
    List(ListArgs),
    /// Print one draft's payload as JSON
    Show(DraftArgs),
    /// Delete a draft (an already-deleted draft is not an error)
    Delete(DraftArgs),
}

#[derive(Args, Debug)]
pub(crate) struct ListArgs {
    #[command(flatten)]
    pub(crate) user: UserArgs,
}

#[derive(Args, Debug)]
pub(crate) struct DraftArgs {
    /// Draft identifier as shown by `drafts list`
    pub(crate) draft_id: String,
    #[command(flatten)]
    pub(crate) user: UserArgs,
}

#[derive(Args, Debug)]
pub(crate) struct RecoverArgs {
    #[command(flatten)]
    pub(crate) user: UserArgs,
    /// Discard the local copy after printing it
    #[arg(long)]
    pub(crate) clear: bool,
}

type CliDraftStore = DraftStore<PortalClient, FileFallbackCache>;

fn open_store(user: &UserArgs) -> Result<CliDraftStore, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let client = PortalClient::from_config(&config.portal)?;
    let (client, owner) = match &user.user {
        Some(user) => (client.with_token(user.clone()), OwnerId(user.clone())),
        None => {
            let owner = config.portal.owner()?;
            (client, owner)
        }
    };
    let cache = FileFallbackCache::new(config.portal.fallback_path.clone());
    Ok(DraftStore::new(Arc::new(client), Arc::new(cache), owner))
}

pub(crate) async fn run_drafts(command: DraftsCommand) -> Result<(), AppError> {
    match command {
        DraftsCommand::List(args) => {
            let store = open_store(&args.user)?;
            let drafts = store.list_drafts().await?;
            if drafts.is_empty() {
                println!("No drafts for {}", store.owner());
                return Ok(());
            }
            println!("Drafts for {}", store.owner());
            for draft in drafts {
                let name = if draft.student_name.trim().is_empty() {
                    "(unnamed)"
                } else {
                    draft.student_name.as_str()
                };
                println!(
                    "- {} | saved {} | {} | {} of {} documents attached",
                    draft.draft_id,
                    draft.saved_at.format("%Y-%m-%d %H:%M"),
                    name,
                    draft.payload.uploaded_files.attached_count(),
                    DocumentKey::ALL.len()
                );
            }
        }
        DraftsCommand::Show(args) => {
            let store = open_store(&args.user)?;
            let draft = store.get_draft(&DraftId(args.draft_id)).await?;
            println!("Draft {} (saved {})", draft.draft_id, draft.saved_at.to_rfc3339());
            println!("{}", pretty(&draft.payload));
        }
        DraftsCommand::Delete(args) => {
            let store = open_store(&args.user)?;
            let draft_id = DraftId(args.draft_id);
            store.delete_draft(&draft_id).await?;
            println!("Draft {draft_id} deleted");
        }
    }
    Ok(())
}

pub(crate) async fn run_recover(args: RecoverArgs) -> Result<(), AppError> {
    let store = open_store(&args.user)?;
    match store.recover().await? {
        Some(entry) => {
            let draft = entry
                .draft_id
                .as_ref()
                .map(|id| id.0.as_str())
                .unwrap_or("never saved remotely");
            println!(
                "Local copy for {} (draft: {draft}, stored {})",
                entry.owner,
                entry.stored_at.to_rfc3339()
            );
            println!("{}", pretty(&entry.payload));
            if args.clear {
                store.clear_fallback().await?;
                println!("Local copy discarded");
            }
        }
        None => println!("No local copy for {}", store.owner()),
    }
    Ok(())
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("<unprintable: {err}>"))
}
