use crate::analytics::{self, DEFAULT_RECENT_LIMIT};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const RECENT_LIMIT_MAX: i64 = 500;

fn handle_analytics_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let limit = match req.params.get("limit").and_then(|v| v.as_i64()) {
        None => DEFAULT_RECENT_LIMIT,
        Some(v) if (0..=RECENT_LIMIT_MAX).contains(&v) => v as usize,
        Some(v) => {
            return err(
                &req.id,
                "bad_params",
                "limit out of range",
                Some(json!({ "limit": v, "max": RECENT_LIMIT_MAX })),
            )
        }
    };

    let ttl = state.config.analytics_ttl();
    let (table, cached) = match helpers::read_through_cache(state, ttl) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let summary = analytics::summarize(&table, limit);
    ok(
        &req.id,
        json!({
            "cached": cached,
            "summary": summary,
        }),
    )
}

/// Raw read view of the sheet, served through the same cache as analytics.
fn handle_sheet_read(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ttl = state.config.analytics_ttl();
    let (table, cached) = match helpers::read_through_cache(state, ttl) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    ok(
        &req.id,
        json!({
            "cached": cached,
            "header": table.header,
            "rows": table.rows,
            "version": table.version(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.summary" => Some(handle_analytics_summary(state, req)),
        "sheet.read" => Some(handle_sheet_read(state, req)),
        _ => None,
    }
}
