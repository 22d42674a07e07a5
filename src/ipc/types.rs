use std::path::PathBuf;

use serde::Deserialize;

use crate::cache::ReadCache;
use crate::client::ClientRegistry;
use crate::config::AppConfig;
use crate::sheet::{EditBuffer, Table};
use crate::store::SheetTarget;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub config: AppConfig,
    pub clients: ClientRegistry,
    pub cache: ReadCache<SheetTarget, Table>,
    /// Grid edit buffer; while present it is the only copy the grid edits.
    pub grid: Option<EditBuffer>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            config: AppConfig::default(),
            clients: ClientRegistry::default(),
            cache: ReadCache::new(),
            grid: None,
        }
    }
}
