//! Terminal front-end for the label sleuth annotation service.
//!
//! The library holds everything except argument parsing: the backend client,
//! the application state with its update functions, and the workspace
//! controller that ties the two together.

pub mod api;
pub mod cli;
pub mod config;
pub mod models;
pub mod navigation;
pub mod pagination;
pub mod state;
pub mod sync;
pub mod workspace;

pub use api::{ApiClient, ApiError, LabelingBackend};
pub use config::Settings;
pub use models::{Document, Element, Label, LabelCount, LabelDelta, ValidationError};
pub use state::AppState;
pub use workspace::Workspace;
