#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for searching one or more IMAP accounts

use clap::{Parser, Subcommand};
use federated_mail_search::{
    AccountConfig, BoundFolder, CriteriaBuilder, FilterKind, FolderHandle, FolderInfo,
    FolderSelection, ImapStore, LabelRegistry, LocalAggregation, LogAlerts, MailStore,
    QuickFilter, RuleBook, SearchCoordinator, SearchCriteria, SearchKind, SearchScope,
    SearchState, StoreProvider, VirtualFolderManager,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mail-search")]
#[command(about = "Search a folder, a subtree, an account or every account")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show the folder tree of every configured account
    Folders {
        /// Only this account
        #[arg(long)]
        account: Option<String>,
    },

    /// Run a search and list the folders it spans
    Search {
        /// Search text
        #[arg(default_value = "")]
        text: String,

        /// Quick-search kind (e.g. subject-contains, body-contains)
        #[arg(long, value_parser = parse_kebab::<SearchKind>, default_value = "subject-or-addresses-contain")]
        kind: SearchKind,

        /// Quick filter (e.g. unread, last5-days, no-label)
        #[arg(long, value_parser = parse_kebab::<FilterKind>, default_value = "all")]
        filter: FilterKind,

        /// Restrict to one label tag instead of a fixed filter
        #[arg(long, conflicts_with = "filter")]
        label: Option<String>,

        /// current-folder, current-folder-and-subfolders,
        /// current-account or all-accounts
        #[arg(long, value_parser = parse_kebab::<SearchScope>, default_value = "current-folder")]
        scope: SearchScope,

        /// Saved rule id to search with
        #[arg(long)]
        rule: Option<String>,

        /// JSON file with saved rules
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Account of the selected folder (defaults to the first one)
        #[arg(long)]
        account: Option<String>,

        /// Selected folder
        #[arg(long, default_value = "INBOX")]
        folder: String,
    },
}

fn parse_kebab<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("Unknown value '{s}'"))
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    state: SearchState,
    bound: &'a BoundFolder,
    expression: &'a str,
    search_words: &'a [String],
    folders: Vec<FolderHandle>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let stores: Vec<Arc<dyn MailStore>> = AccountConfig::all_from_env()?
        .into_iter()
        .map(|account| Arc::new(ImapStore::from_account(account)) as Arc<dyn MailStore>)
        .collect();

    match &args.command {
        Command::Folders { account } => {
            cmd_folders(&stores, &args, account.as_deref()).await?;
        }
        Command::Search {
            text,
            kind,
            filter,
            label,
            scope,
            rule,
            rules,
            account,
            folder,
        } => {
            let filter = label
                .as_ref()
                .map_or(QuickFilter::Fixed(*filter), QuickFilter::label);
            let mut criteria = SearchCriteria::new(text.as_str())
                .kind(*kind)
                .filter(filter)
                .scope(*scope);
            criteria.rule.clone_from(rule);

            let rules = match rules {
                Some(path) => RuleBook::load(path)?,
                None => RuleBook::new(),
            };
            cmd_search(stores, &args, &criteria, rules, account.as_deref(), folder).await?;
        }
    }

    Ok(())
}

async fn cmd_folders(
    stores: &[Arc<dyn MailStore>],
    args: &Args,
    account: Option<&str>,
) -> anyhow::Result<()> {
    let mut trees = Vec::new();
    for store in stores.iter().filter(|s| account.is_none_or(|a| a == s.uid())) {
        trees.push((store.uid().to_string(), store.folder_info(None).await?));
    }

    if args.json {
        let map: serde_json::Map<String, serde_json::Value> = trees
            .into_iter()
            .map(|(uid, tree)| Ok((uid, serde_json::to_value(tree)?)))
            .collect::<serde_json::Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        for (uid, tree) in &trees {
            println!("{uid}");
            print_tree(tree, 1);
        }
    }

    Ok(())
}

async fn cmd_search(
    stores: Vec<Arc<dyn MailStore>>,
    args: &Args,
    criteria: &SearchCriteria,
    rules: RuleBook,
    account: Option<&str>,
    folder: &str,
) -> anyhow::Result<()> {
    let account = match account {
        Some(uid) => uid.to_string(),
        None => stores
            .first()
            .map(|s| s.uid().to_string())
            .ok_or_else(|| anyhow::anyhow!("No accounts configured"))?,
    };
    let provider: Arc<dyn StoreProvider> = Arc::new(stores);

    let labels = LabelRegistry::with_defaults();
    let builder = CriteriaBuilder::new(Arc::new(rules), &labels);
    let folders = VirtualFolderManager::new(Arc::new(LocalAggregation::default()));
    let mut coordinator =
        SearchCoordinator::new(provider.clone(), builder, folders, Arc::new(LogAlerts));

    coordinator.select_folder(selection_for(provider.as_ref(), &account, folder).await);
    coordinator.submit(criteria).await;
    let state = coordinator.settle().await;

    let folders = match coordinator.bound_folder() {
        BoundFolder::Virtual(_) => coordinator
            .membership()
            .map(|m| m.folders.clone())
            .unwrap_or_default(),
        BoundFolder::Folder(selected) => {
            let store = provider
                .store(&selected.store_uid)
                .ok_or_else(|| anyhow::anyhow!("Unknown account '{}'", selected.store_uid))?;
            vec![store.open_folder(&selected.full_name).await?]
        }
        BoundFolder::Nothing => Vec::new(),
    };

    if args.json {
        let output = SearchOutput {
            state,
            bound: coordinator.bound_folder(),
            expression: coordinator.applied_expression().as_str(),
            search_words: coordinator.search_words(),
            folders,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Expression: {}", coordinator.applied_expression());
        print_folder_table(&folders);
    }

    coordinator.shutdown();
    Ok(())
}

/// Select `folder` with the role its store reports, falling back to a
/// guess from the path when the store cannot describe it.
async fn selection_for(
    stores: &dyn StoreProvider,
    account: &str,
    folder: &str,
) -> FolderSelection {
    let Some(store) = stores.store(account) else {
        return FolderSelection::new(account, folder);
    };
    match store.folder_info(Some(folder)).await {
        Ok(nodes) => nodes.first().map_or_else(
            || FolderSelection::new(account, folder),
            |info| FolderSelection::from_info(account, info),
        ),
        Err(e) => {
            tracing::warn!("Cannot describe {}:{}: {}", account, folder, e);
            FolderSelection::new(account, folder)
        }
    }
}

fn print_tree(nodes: &[FolderInfo], depth: usize) {
    for node in nodes {
        let marker = if node.is_searchable() { "" } else { " (no select)" };
        println!("{}{}{marker}", "  ".repeat(depth), node.display_name);
        print_tree(&node.children, depth + 1);
    }
}

fn print_folder_table(folders: &[FolderHandle]) {
    if folders.is_empty() {
        println!("No folders searched.");
        return;
    }

    let header = format!("{:<16} {:<40} {:>8}", "Account", "Folder", "Messages");
    println!("{header}");
    println!("{}", "-".repeat(66));

    for handle in folders {
        println!(
            "{:<16} {:<40} {:>8}",
            truncate(&handle.folder.store_uid, 16),
            truncate(&handle.folder.full_name, 40),
            handle.summary.total,
        );
    }

    println!("\n{} folder(s)", folders.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
