use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::sheet::{BufferError, EditBuffer, Table};
use crate::store::StoreOp;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

const GRID_BULK_UPDATE_MAX_EDITS: usize = 5000;

impl From<BufferError> for HandlerErr {
    fn from(e: BufferError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

fn buffer_json(buf: &EditBuffer) -> serde_json::Value {
    let rows: Vec<Vec<String>> = buf
        .rows
        .iter()
        .map(|r| {
            let mut out = Vec::with_capacity(buf.col_count());
            out.push(r.student.clone());
            out.extend(r.cells.iter().cloned());
            out
        })
        .collect();
    json!({
        "bufferId": buf.id,
        "keyColumn": buf.key_name,
        "columns": buf.grid_header(),
        "rowCount": rows.len(),
        "rows": rows,
        "version": buf.loaded_version,
        "dirty": buf.is_dirty(),
    })
}

/// The open buffer, provided the caller names it. A stale `bufferId` means
/// the grid was reloaded or discarded underneath the caller.
fn require_buffer<'a>(state: &'a mut AppState, req: &Request) -> Result<&'a mut EditBuffer, HandlerErr> {
    let buffer_id = helpers::require_str(req, "bufferId")?;
    match state.grid.as_mut() {
        Some(buf) if buf.id == buffer_id => Ok(buf),
        Some(buf) => Err(HandlerErr::new("no_buffer", "grid buffer was replaced")
            .with_details(json!({ "bufferId": buffer_id, "current": buf.id }))),
        None => Err(HandlerErr::new("no_buffer", "load the grid first")),
    }
}

fn build_buffer(state: &AppState, table: Table) -> Result<EditBuffer, HandlerErr> {
    EditBuffer::from_table(
        Uuid::new_v4().to_string(),
        table,
        &state.config.student_column,
    )
    .map_err(HandlerErr::from)
}

fn handle_grid_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    // An open buffer stays authoritative until it is saved, reloaded or discarded.
    if let Some(buf) = state.grid.as_ref() {
        return ok(&req.id, buffer_json(buf));
    }

    let ttl = state.config.grid_ttl();
    let (table, _) = match helpers::read_through_cache(state, ttl) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let buf = match build_buffer(state, table) {
        Ok(b) => b,
        Err(e) => return e.response(&req.id),
    };
    info!(buffer = %buf.id, rows = buf.rows.len(), "grid buffer loaded");
    let resp = buffer_json(&buf);
    state.grid = Some(buf);
    ok(&req.id, resp)
}

fn handle_grid_reload(state: &mut AppState, req: &Request) -> serde_json::Value {
    helpers::invalidate_target(state);
    let ttl = state.config.grid_ttl();
    let (table, _) = match helpers::read_through_cache(state, ttl) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let buf = match build_buffer(state, table) {
        Ok(b) => b,
        Err(e) => return e.response(&req.id),
    };
    if let Some(old) = state.grid.as_ref() {
        info!(old = %old.id, new = %buf.id, discarded_edits = old.is_dirty(), "grid buffer reloaded");
    }
    let resp = buffer_json(&buf);
    state.grid = Some(buf);
    ok(&req.id, resp)
}

fn handle_grid_discard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let dropped = state.grid.take().is_some();
    ok(&req.id, json!({ "discarded": dropped }))
}

fn handle_grid_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match require_buffer(state, req) {
        Ok(buf) => ok(&req.id, buffer_json(buf)),
        Err(e) => e.response(&req.id),
    }
}

fn handle_grid_add_row(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student = helpers::param_str(req, "student").unwrap_or("").to_string();
    let cells = match req.params.get("cells") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Array(arr)) => {
            let mut out = Vec::with_capacity(arr.len());
            for v in arr {
                match helpers::cell_text(v) {
                    Some(s) => out.push(s),
                    None => return err(&req.id, "bad_params", "cells must be scalars", None),
                }
            }
            Some(out)
        }
        Some(_) => return err(&req.id, "bad_params", "cells must be an array", None),
    };

    let buf = match require_buffer(state, req) {
        Ok(b) => b,
        Err(e) => return e.response(&req.id),
    };
    match buf.add_row(student, cells) {
        Ok(row) => ok(&req.id, json!({ "row": row, "rowCount": buf.rows.len() })),
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

fn handle_grid_delete_row(state: &mut AppState, req: &Request) -> serde_json::Value {
    let row = match helpers::param_index(req, "row") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let buf = match require_buffer(state, req) {
        Ok(b) => b,
        Err(e) => return e.response(&req.id),
    };
    match buf.delete_row(row) {
        Ok(removed) => ok(
            &req.id,
            json!({ "removed": removed, "rowCount": buf.rows.len() }),
        ),
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

fn handle_grid_update_cell(state: &mut AppState, req: &Request) -> serde_json::Value {
    let row = match helpers::param_index(req, "row") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let col = match helpers::param_index(req, "col") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let value = match req.params.get("value").map(helpers::cell_text) {
        Some(Some(v)) => v,
        None => String::new(),
        Some(None) => return err(&req.id, "bad_params", "value must be a scalar", None),
    };

    let buf = match require_buffer(state, req) {
        Ok(b) => b,
        Err(e) => return e.response(&req.id),
    };
    if let Err(e) = buf.set_cell(row, col, value) {
        return HandlerErr::from(e).response(&req.id);
    }
    ok(&req.id, json!({ "ok": true }))
}

fn handle_grid_bulk_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(edits_arr) = req.params.get("edits").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing edits[]", None);
    };
    let buf = match require_buffer(state, req) {
        Ok(b) => b,
        Err(e) => return e.response(&req.id),
    };

    if edits_arr.len() > GRID_BULK_UPDATE_MAX_EDITS {
        let rejected = edits_arr.len();
        return ok(
            &req.id,
            json!({
                "ok": true,
                "updated": 0,
                "rejected": rejected,
                "limitExceeded": true,
                "errors": [{
                    "row": -1,
                    "col": -1,
                    "code": "too_many_edits",
                    "message": format!(
                        "bulk payload exceeds max edits: {} > {}",
                        rejected, GRID_BULK_UPDATE_MAX_EDITS
                    )
                }]
            }),
        );
    }

    let mut updated: usize = 0;
    let mut errors: Vec<serde_json::Value> = Vec::new();

    for (i, edit) in edits_arr.iter().enumerate() {
        let Some(obj) = edit.as_object() else {
            errors.push(json!({
                "row": -1,
                "col": -1,
                "code": "bad_params",
                "message": format!("edit at index {} must be an object", i),
            }));
            continue;
        };

        let row = match obj.get("row").and_then(|v| v.as_i64()) {
            Some(v) if v >= 0 => v,
            _ => {
                errors.push(json!({
                    "row": -1,
                    "col": -1,
                    "code": "bad_params",
                    "message": format!("edit at index {} missing/invalid row", i),
                }));
                continue;
            }
        };
        let col = match obj.get("col").and_then(|v| v.as_i64()) {
            Some(v) if v >= 0 => v,
            _ => {
                errors.push(json!({
                    "row": row,
                    "col": -1,
                    "code": "bad_params",
                    "message": format!("edit at index {} missing/invalid col", i),
                }));
                continue;
            }
        };
        let Some(value) = obj
            .get("value")
            .map(helpers::cell_text)
            .unwrap_or_else(|| Some(String::new()))
        else {
            errors.push(json!({
                "row": row,
                "col": col,
                "code": "bad_params",
                "message": format!("edit at index {} value must be a scalar", i),
            }));
            continue;
        };

        match buf.set_cell(row as usize, col as usize, value) {
            Ok(()) => updated += 1,
            Err(e) => errors.push(json!({
                "row": row,
                "col": col,
                "code": e.code(),
                "message": e.to_string(),
            })),
        }
    }

    let rejected = errors.len();
    let mut result = json!({ "ok": true, "updated": updated });
    if rejected > 0 {
        result["rejected"] = json!(rejected);
        result["errors"] = json!(errors);
    }
    ok(&req.id, result)
}

/// Writes the whole buffer over the remote worksheet.
///
/// Last writer wins unless `expectedVersion` is given, in which case the
/// remote content is re-read and must still match that stamp.
fn handle_grid_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let expected_version = helpers::param_str(req, "expectedVersion").map(str::to_string);
    let (buffer_id, table) = match require_buffer(state, req) {
        Ok(buf) => (buf.id.clone(), buf.to_table()),
        Err(e) => return e.response(&req.id),
    };
    let client = match helpers::client(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    let target = state.config.target();

    if let Some(expected) = expected_version {
        let remote = match client.read_all(&target) {
            Ok(t) => t.drop_blank_index_columns(),
            Err(e) => return HandlerErr::store(&e, StoreOp::Read).response(&req.id),
        };
        let remote_version = remote.version();
        if remote_version != expected {
            warn!(buffer = %buffer_id, "grid save rejected: sheet changed since load");
            return err(
                &req.id,
                "version_conflict",
                "the sheet changed since it was loaded; reload before saving",
                Some(json!({ "expected": expected, "actual": remote_version })),
            );
        }
    }

    if let Err(e) = client.overwrite_all(&target, &table) {
        warn!(buffer = %buffer_id, error = %e, "grid save failed; buffer kept");
        return HandlerErr::store(&e, StoreOp::Write).response(&req.id);
    }
    helpers::invalidate_target(state);

    // Re-sync: the buffer becomes exactly what was written.
    let saved = match EditBuffer::from_table(buffer_id.clone(), table, &state.config.student_column) {
        Ok(b) => b,
        Err(e) => return HandlerErr::from(e).response(&req.id),
    };
    info!(buffer = %buffer_id, rows = saved.rows.len(), "grid saved");
    let resp = buffer_json(&saved);
    state.grid = Some(saved);
    ok(&req.id, resp)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grid.load" => Some(handle_grid_load(state, req)),
        "grid.reload" => Some(handle_grid_reload(state, req)),
        "grid.discard" => Some(handle_grid_discard(state, req)),
        "grid.get" => Some(handle_grid_get(state, req)),
        "grid.addRow" => Some(handle_grid_add_row(state, req)),
        "grid.deleteRow" => Some(handle_grid_delete_row(state, req)),
        "grid.updateCell" => Some(handle_grid_update_cell(state, req)),
        "grid.bulkUpdate" => Some(handle_grid_bulk_update(state, req)),
        "grid.save" => Some(handle_grid_save(state, req)),
        _ => None,
    }
}
