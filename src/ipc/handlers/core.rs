use crate::cache::ReadCache;
use crate::config::AppConfig;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backend": state.config.backend.as_str(),
            "connected": state.clients.is_connected(),
            "cachedEntries": state.cache.len(),
            "gridBufferId": state.grid.as_ref().map(|b| b.id.clone()),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    if let Err(e) = std::fs::create_dir_all(&path) {
        return err(&req.id, "workspace_open_failed", e.to_string(), None);
    }
    let cfg = match AppConfig::load(&path) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "config_invalid", format!("{e:#}"), None),
    };

    // A new workspace starts from a clean slate: handle, cache and buffer all go.
    state.clients.reset_client();
    state.cache = ReadCache::new();
    state.grid = None;
    state.config = cfg;
    state.workspace = Some(path.clone());
    info!(workspace = %path.display(), backend = state.config.backend.as_str(), "workspace selected");

    // Best-effort: report a broken connection now, but still open the workspace.
    let connect_error = match helpers::client(state) {
        Ok(_) => None,
        Err(e) => {
            warn!(code = e.code, "initial connection failed");
            Some(json!({ "code": e.code, "message": e.message }))
        }
    };

    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "backend": state.config.backend.as_str(),
            "connectError": connect_error,
        }),
    )
}

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, state.config.redacted_json())
}

fn handle_client_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let dropped = state.clients.reset_client();
    state.cache.clear();
    info!(dropped, "spreadsheet client reset");
    ok(&req.id, json!({ "dropped": dropped }))
}

fn handle_cache_invalidate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let removed = helpers::invalidate_target(state);
    ok(&req.id, json!({ "invalidated": removed }))
}

fn handle_roster_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = state.config.roster();
    ok(
        &req.id,
        json!({
            "students": roster.names(),
            "options": roster.options(),
            "placeholder": crate::roster::CHOOSE_STUDENT,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "config.get" => Some(handle_config_get(state, req)),
        "client.reset" => Some(handle_client_reset(state, req)),
        "cache.invalidate" => Some(handle_cache_invalidate(state, req)),
        "roster.list" => Some(handle_roster_list(state, req)),
        _ => None,
    }
}
