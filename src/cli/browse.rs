//! Interactive document browser.

use std::io::Write as _;

use anyhow::Result;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::render;
use crate::api::LabelingBackend;
use crate::models::{Label, ValidationError};
use crate::navigation::{Direction, NavigationOutcome};
use crate::workspace::{LabelOutcome, Workspace};

const HELP: &str = "\
commands:
  n / p              next / previous document
  page N             go to page N
  + / -              next / previous page
  label ID VALUE     set label (pos, neg, none)
  info               information gain for the category
  h                  this help
  q                  quit";

/// One line of browser input.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowseCommand {
    Navigate(Direction),
    Page(i64),
    PageStep(i64),
    Label { element_id: String, label: Label },
    InfoGain,
    Help,
    Quit,
}

impl BrowseCommand {
    /// Parse a line; `Ok(None)` for blank input.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let command = match head {
            "n" | "next" => Self::Navigate(Direction::Next),
            "p" | "prev" => Self::Navigate(Direction::Prev),
            "+" => Self::PageStep(1),
            "-" => Self::PageStep(-1),
            "page" => {
                let page = words
                    .next()
                    .ok_or("usage: page N")?
                    .parse::<i64>()
                    .map_err(|_| "page must be a number".to_string())?;
                Self::Page(page)
            }
            "label" | "l" => {
                let (Some(element_id), Some(value)) = (words.next(), words.next()) else {
                    return Err("usage: label ID pos|neg|none".to_string());
                };
                let label = value
                    .parse::<Label>()
                    .map_err(|e: ValidationError| e.to_string())?;
                Self::Label {
                    element_id: element_id.to_string(),
                    label,
                }
            }
            "info" | "i" => Self::InfoGain,
            "h" | "help" | "?" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command {:?} (h for help)", other)),
        };
        Ok(Some(command))
    }
}

async fn print_page<B: LabelingBackend>(workspace: &Workspace<B>) {
    let state = workspace.snapshot().await;
    print!("{}", render::document_page(&state));
    workspace.state().await.clear_error();
}

fn prompt() {
    print!("{} ", style(">").cyan());
    let _ = std::io::stdout().flush();
}

/// Run the browser loop until `q` or end of input.
pub async fn run<B: LabelingBackend>(workspace: &Workspace<B>, start: usize) -> Result<()> {
    if workspace.load_documents().await? == 0 {
        println!("{}", style("Workspace has no documents").dim());
        return Ok(());
    }
    workspace.refresh_positive_elements().await?;
    workspace.open_document(start).await?;
    print_page(workspace).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        let command = match BrowseCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => {
                prompt();
                continue;
            }
            Err(message) => {
                println!("{}", style(message).yellow());
                prompt();
                continue;
            }
        };
        debug!("browse command {:?}", command);

        if command == BrowseCommand::Quit {
            break;
        }
        // Failures are already recorded in the state and shown with the page.
        if let Err(err) = execute(workspace, command).await {
            debug!("command failed: {}", err);
        }
        prompt();
    }

    workspace.close_view().await;
    Ok(())
}

async fn execute<B: LabelingBackend>(
    workspace: &Workspace<B>,
    command: BrowseCommand,
) -> Result<()> {
    match command {
        BrowseCommand::Navigate(direction) => {
            let outcome = workspace.fetch_adjacent_document(direction).await;
            if let Ok(NavigationOutcome::NoOp) = outcome {
                println!("{}", style("No more documents in that direction").dim());
            }
            print_page(workspace).await;
            outcome?;
        }
        BrowseCommand::Page(page) => {
            workspace.state().await.go_to_page(page);
            print_page(workspace).await;
        }
        BrowseCommand::PageStep(step) => {
            {
                let mut state = workspace.state().await;
                let current = state.paginator.current_page() as i64;
                state.go_to_page(current + step);
            }
            print_page(workspace).await;
        }
        BrowseCommand::Label { element_id, label } => {
            let outcome = workspace.set_element_label(&element_id, label).await;
            if let Ok(LabelOutcome::Applied(_)) = outcome {
                workspace.state().await.reveal_element(&element_id);
            }
            print_page(workspace).await;
            outcome?;
        }
        BrowseCommand::InfoGain => match workspace.label_info_gain().await {
            Ok(Some(info_gain)) => println!("{}", serde_json::to_string_pretty(&info_gain)?),
            Ok(None) => {}
            Err(err) => {
                print_page(workspace).await;
                return Err(err.into());
            }
        },
        BrowseCommand::Help => println!("{}", HELP),
        BrowseCommand::Quit => {}
    }
    Ok(())
}
