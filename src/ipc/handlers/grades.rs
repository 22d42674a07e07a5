use crate::grades::{self, GradeSubmission, SubmitError, DEFAULT_GRADE};
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::store::StoreOp;
use serde_json::json;

fn parse_submission(req: &Request) -> Result<GradeSubmission, HandlerErr> {
    let date = helpers::param_date(req)?;
    let subject = helpers::require_str(req, "subject")?.to_string();
    let student = helpers::require_str(req, "student")?.to_string();
    let grade = match req.params.get("grade") {
        None | Some(serde_json::Value::Null) => DEFAULT_GRADE,
        Some(v) => v
            .as_f64()
            .ok_or_else(|| HandlerErr::bad_params("grade must be a number"))?,
    };
    Ok(GradeSubmission {
        date,
        subject,
        other_subject: helpers::param_str(req, "otherSubject").map(str::to_string),
        student,
        grade,
        comment: helpers::param_str(req, "comment").unwrap_or("").to_string(),
    })
}

fn handle_grades_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let sub = match parse_submission(req) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };

    // Selection problems are the user's to fix; nothing remote is touched.
    let roster = state.config.roster();
    if let Err(e) = grades::validate(&sub, &roster, state.config.strict_roster) {
        return err(
            &req.id,
            "validation_failed",
            e.to_string(),
            Some(json!({ "field": e.field() })),
        );
    }

    let client = match helpers::client(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    let target = state.config.target();
    let result = grades::submit(
        client.as_ref(),
        &target,
        &sub,
        &roster,
        state.config.strict_roster,
        || chrono::Local::now().naive_local(),
    );

    match result {
        Ok(record) => {
            helpers::invalidate_target(state);
            let message = format!(
                "{} күнгі '{}' пәнінен '{}' үшін баға ({}) сәтті сақталды!",
                record.date, record.subject, record.student, record.grade
            );
            ok(
                &req.id,
                json!({
                    "record": record.to_json(),
                    "message": message,
                }),
            )
        }
        Err(SubmitError::Validation(e)) => err(
            &req.id,
            "validation_failed",
            e.to_string(),
            Some(json!({ "field": e.field() })),
        ),
        Err(SubmitError::Store(e)) => HandlerErr::store(&e, StoreOp::Write).response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.submit" => Some(handle_grades_submit(state, req)),
        _ => None,
    }
}
