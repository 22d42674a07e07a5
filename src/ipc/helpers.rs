use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::store::{format_number, SheetStore, StoreError, StoreOp};
use crate::sheet::Table;
use chrono::NaiveDate;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

pub fn param_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn require_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, HandlerErr> {
    param_str(req, key).ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn param_index(req: &Request, key: &str) -> Result<usize, HandlerErr> {
    match req.params.get(key).and_then(|v| v.as_i64()) {
        Some(v) if v >= 0 => Ok(v as usize),
        _ => Err(HandlerErr::bad_params(format!("missing/invalid {}", key))),
    }
}

/// `params.date` as `YYYY-MM-DD`; today when absent.
pub fn param_date(req: &Request) -> Result<NaiveDate, HandlerErr> {
    match param_str(req, "date") {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            HandlerErr::bad_params("date must be YYYY-MM-DD")
                .with_details(serde_json::json!({ "date": s }))
        }),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// Grid cells are text; numbers are rendered the way the sheet shows them.
pub fn cell_text(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => n.as_f64().map(format_number),
        serde_json::Value::Null => Some(String::new()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn client(state: &mut AppState) -> Result<Rc<dyn SheetStore>, HandlerErr> {
    let Some(workspace) = state.workspace.clone() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    state
        .clients
        .get_or_create_client(&workspace, &state.config)
        .map_err(|e| HandlerErr::store(&e, StoreOp::Read))
}

/// Reads the configured worksheet, serving a cached copy younger than `ttl`.
/// Returns the table and whether it came from the cache.
pub fn read_through_cache(state: &mut AppState, ttl: Duration) -> Result<(Table, bool), HandlerErr> {
    let client = client(state)?;
    let target = state.config.target();
    state
        .cache
        .get_or_fetch(&target, ttl, Instant::now(), || -> Result<Table, StoreError> {
            let started = Instant::now();
            let table = client.read_all(&target)?;
            debug!(
                backend = client.backend_name(),
                sheet = %target.sheet,
                worksheet = %target.worksheet,
                rows = table.rows.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "sheet fetched"
            );
            Ok(table)
        })
        .map_err(|e| HandlerErr::store(&e, StoreOp::Read))
}

/// Drops any cached copy of the configured worksheet.
pub fn invalidate_target(state: &mut AppState) -> bool {
    let target = state.config.target();
    state.cache.invalidate(&target)
}
