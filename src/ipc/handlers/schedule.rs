use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::schedule::{CHOOSE_SUBJECT, FREE_TEXT, NO_CLASS};
use serde_json::json;

fn handle_schedule_subjects(state: &mut AppState, req: &Request) -> serde_json::Value {
    let date = match helpers::param_date(req) {
        Ok(d) => d,
        Err(e) => return e.response(&req.id),
    };
    let day = state.config.schedule().day(date);
    ok(&req.id, json!(day))
}

fn handle_schedule_week(state: &mut AppState, req: &Request) -> serde_json::Value {
    let date = match helpers::param_date(req) {
        Ok(d) => d,
        Err(e) => return e.response(&req.id),
    };
    let Some(days) = state.config.schedule().week(date) else {
        return err(
            &req.id,
            "bad_params",
            "week is outside the supported date range",
            Some(json!({ "date": date.format("%Y-%m-%d").to_string() })),
        );
    };
    ok(
        &req.id,
        json!({
            "days": days,
            "sentinels": {
                "chooseSubject": CHOOSE_SUBJECT,
                "noClass": NO_CLASS,
                "freeText": FREE_TEXT,
            }
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.subjects" => Some(handle_schedule_subjects(state, req)),
        "schedule.week" => Some(handle_schedule_week(state, req)),
        _ => None,
    }
}
