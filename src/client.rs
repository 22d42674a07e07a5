use crate::config::{AppConfig, Backend};
use crate::sheet::SCHEMA_HEADER;
use crate::store::google::GoogleSheetsStore;
use crate::store::memory::MemoryStore;
use crate::store::sqlite::SqliteStore;
use crate::store::{SheetStore, StoreError};
use std::path::Path;
use std::rc::Rc;
use tracing::{info, warn};

/// Process-scoped, lazily created store handle.
///
/// Creation failures are not remembered, so every request retries the
/// connection and fails the same way until the configuration is fixed.
#[derive(Default)]
pub struct ClientRegistry {
    slot: Option<Rc<dyn SheetStore>>,
}

impl ClientRegistry {
    pub fn get_or_create_client(
        &mut self,
        workspace: &Path,
        cfg: &AppConfig,
    ) -> Result<Rc<dyn SheetStore>, StoreError> {
        if let Some(client) = &self.slot {
            return Ok(client.clone());
        }
        let client = match connect(workspace, cfg) {
            Ok(c) => c,
            Err(e) => {
                warn!(backend = cfg.backend.as_str(), error = %e, "spreadsheet client unavailable");
                return Err(e);
            }
        };
        info!(backend = client.backend_name(), sheet = %cfg.sheet_name, "spreadsheet client ready");
        self.slot = Some(client.clone());
        Ok(client)
    }

    /// Drops the shared handle; the next request reconnects.
    pub fn reset_client(&mut self) -> bool {
        self.slot.take().is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.slot.is_some()
    }

    #[cfg(test)]
    pub fn preset(&mut self, client: Rc<dyn SheetStore>) {
        self.slot = Some(client);
    }
}

fn schema_header() -> Vec<String> {
    SCHEMA_HEADER.iter().map(|s| s.to_string()).collect()
}

fn connect(workspace: &Path, cfg: &AppConfig) -> Result<Rc<dyn SheetStore>, StoreError> {
    match cfg.backend {
        Backend::Google => {
            let token = cfg.google_token.as_deref().unwrap_or("");
            Ok(Rc::new(GoogleSheetsStore::new(token)?))
        }
        Backend::Sqlite => {
            let store = SqliteStore::open(workspace)
                .map_err(|e| StoreError::Connection(format!("{e:#}")))?;
            store.ensure_worksheet(&cfg.target(), &schema_header())?;
            Ok(Rc::new(store))
        }
        Backend::Memory => {
            let store = MemoryStore::new();
            store.ensure_worksheet(&cfg.target(), &schema_header());
            Ok(Rc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_is_shared_until_reset() {
        let cfg = AppConfig {
            backend: Backend::Memory,
            ..AppConfig::default()
        };
        let ws = std::env::temp_dir();
        let mut reg = ClientRegistry::default();
        let a = reg.get_or_create_client(&ws, &cfg).expect("client");
        let b = reg.get_or_create_client(&ws, &cfg).expect("client");
        assert!(Rc::ptr_eq(&a, &b));
        assert!(reg.reset_client());
        assert!(!reg.is_connected());
        let c = reg.get_or_create_client(&ws, &cfg).expect("client");
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn google_without_token_fails_every_time() {
        let cfg = AppConfig {
            backend: Backend::Google,
            google_token: None,
            ..AppConfig::default()
        };
        let ws = std::env::temp_dir();
        let mut reg = ClientRegistry::default();
        for _ in 0..2 {
            match reg.get_or_create_client(&ws, &cfg) {
                Err(StoreError::Connection(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => panic!("expected connection failure"),
            }
        }
        assert!(!reg.is_connected());
    }
}
