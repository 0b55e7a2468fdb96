//! Command line interface of the `sleuth` binary.

mod browse;
mod render;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{ApiClient, ApiError};
use crate::config::Settings;
use crate::models::Label;
use crate::navigation::NavigationOutcome;
use crate::workspace::{LabelOutcome, Workspace};

pub use browse::BrowseCommand;

/// Terminal front-end for a label sleuth workspace.
#[derive(Parser, Debug)]
#[command(name = "sleuth")]
#[command(about = "Review documents and label text elements of a label sleuth workspace")]
#[command(version)]
pub struct Cli {
    /// Backend root URL
    #[arg(long, global = true, env = "SLEUTH_BASE_URL")]
    pub base_url: Option<String>,

    /// Workspace id
    #[arg(short, long, global = true, env = "SLEUTH_WORKSPACE")]
    pub workspace: Option<String>,

    /// Category labels are assigned for
    #[arg(short, long, global = true, env = "SLEUTH_CATEGORY")]
    pub category: Option<String>,

    /// Bearer token
    #[arg(long, global = true, env = "SLEUTH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Elements per page
    #[arg(long, global = true)]
    pub page_size: Option<usize>,

    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the documents of the workspace
    Documents,

    /// Print one page of a document
    Show {
        /// Document index (0-based)
        #[arg(long, default_value = "0")]
        doc: usize,

        /// Page number (1-based, clamped)
        #[arg(long, default_value = "1", allow_hyphen_values = true)]
        page: i64,
    },

    /// Assign a label to an element
    Label {
        /// Element id
        element_id: String,

        /// pos, neg or none
        value: Label,

        /// Document the element belongs to, for the label counts
        #[arg(long, default_value = "0")]
        doc: usize,
    },

    /// Download all labels as CSV
    Download {
        /// Target directory (defaults to the configured download directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a label file
    Upload {
        /// CSV file to upload
        file: PathBuf,
    },

    /// Show information gain for the current category
    InfoGain,

    /// Interactive document browser
    Browse {
        /// Document index to start at
        #[arg(long, default_value = "0")]
        doc: usize,
    },
}

impl Cli {
    /// Apply command line overrides on top of file configuration.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref base_url) = self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(ref workspace) = self.workspace {
            settings.workspace_id = workspace.clone();
        }
        if let Some(ref category) = self.category {
            settings.category = Some(category.clone());
        }
        if let Some(ref token) = self.token {
            settings.token = Some(token.clone());
        }
        if let Some(page_size) = self.page_size {
            settings.elements_per_page = page_size;
        }
    }
}

/// Run a parsed command against the configured workspace.
pub async fn run(command: Commands, settings: &Settings) -> Result<()> {
    let workspace = Workspace::connect(settings)?;

    match command {
        Commands::Documents => cmd_documents(&workspace).await,
        Commands::Show { doc, page } => cmd_show(&workspace, doc, page).await,
        Commands::Label {
            element_id,
            value,
            doc,
        } => cmd_label(&workspace, &element_id, value, doc).await,
        Commands::Download { output } => {
            let dir = output.unwrap_or_else(|| settings.download_dir.clone());
            cmd_download(&workspace, dir).await
        }
        Commands::Upload { file } => cmd_upload(&workspace, file).await,
        Commands::InfoGain => cmd_info_gain(&workspace).await,
        Commands::Browse { doc } => browse::run(&workspace, doc).await,
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(spinner_style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Fetch the document list and open `doc`, with the positive projection.
async fn open(workspace: &Workspace<ApiClient>, doc: usize) -> Result<bool> {
    if workspace.load_documents().await? == 0 {
        println!("{}", style("Workspace has no documents").dim());
        return Ok(false);
    }
    workspace.refresh_positive_elements().await?;
    match workspace.open_document(doc).await? {
        NavigationOutcome::Moved(_) => Ok(true),
        other => bail!("could not open document {}: {:?}", doc, other),
    }
}

async fn cmd_documents(workspace: &Workspace<ApiClient>) -> Result<()> {
    workspace.load_documents().await?;
    let state = workspace.snapshot().await;
    print!("{}", render::document_list(&state));
    Ok(())
}

async fn cmd_show(workspace: &Workspace<ApiClient>, doc: usize, page: i64) -> Result<()> {
    if !open(workspace, doc).await? {
        return Ok(());
    }
    let state = {
        let mut state = workspace.state().await;
        state.go_to_page(page);
        state.clone()
    };
    print!("{}", render::document_page(&state));
    Ok(())
}

async fn cmd_label(
    workspace: &Workspace<ApiClient>,
    element_id: &str,
    value: Label,
    doc: usize,
) -> Result<()> {
    open(workspace, doc).await?;
    match workspace.set_element_label(element_id, value).await? {
        LabelOutcome::Applied(_) => {
            let state = workspace.snapshot().await;
            println!(
                "{} {} {}",
                style("Labeled").green(),
                element_id,
                render::label_tag(value)
            );
            println!("{}", render::label_counts(&state));
        }
        other => println!("{} ({:?})", style("Label update not applied").yellow(), other),
    }
    Ok(())
}

async fn cmd_download(workspace: &Workspace<ApiClient>, dir: PathBuf) -> Result<()> {
    tokio::fs::create_dir_all(&dir).await.map_err(ApiError::from)?;
    let pb = spinner("Downloading labels...");
    let result = workspace.download_labels(&dir).await;
    pb.finish_and_clear();

    if let Some(path) = result? {
        println!("{} {}", style("Saved").green(), path.display());
    }
    Ok(())
}

async fn cmd_upload(workspace: &Workspace<ApiClient>, file: PathBuf) -> Result<()> {
    let pb = spinner("Uploading labels...");
    let result = workspace.upload_labels(&file).await;
    pb.finish_and_clear();

    if let Some(summary) = result? {
        print!("{}", render::upload_summary(&summary));
        workspace.state().await.clean_uploaded_labels();
    }
    Ok(())
}

async fn cmd_info_gain(workspace: &Workspace<ApiClient>) -> Result<()> {
    if let Some(info_gain) = workspace.label_info_gain().await? {
        println!("{}", serde_json::to_string_pretty(&info_gain)?);
    }
    Ok(())
}
