mod test_support;

use serde_json::json;
use test_support::{error_code, open_workspace, request, request_ok, submit, temp_dir, write_config};

#[test]
fn submitted_grade_is_appended_in_column_order() {
    let workspace = temp_dir("gradesheet-submit-roundtrip");
    let mut sc = open_workspace(&workspace);
    let started = chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    let result = request_ok(
        &mut sc,
        "1",
        "grades.submit",
        json!({
            "date": "2025-11-24",
            "subject": "Физика",
            "student": "Ардабек Ерлан",
            "grade": 88,
            "comment": "СӨЖ-1",
        }),
    );
    let recorded_at = result["record"]["recordedAt"].as_str().expect("recordedAt").to_string();
    assert!(recorded_at >= started, "{} < {}", recorded_at, started);
    assert!(result["message"].as_str().unwrap_or("").contains("сәтті сақталды"));

    let sheet = request_ok(&mut sc, "2", "sheet.read", json!({}));
    assert_eq!(
        sheet["header"],
        json!(["Күні", "Пән", "Студент", "Баға", "Түсініктеме", "Енгізілген уақыт"])
    );
    assert_eq!(
        sheet["rows"],
        json!([["2025-11-24", "Физика", "Ардабек Ерлан", "88", "СӨЖ-1", recorded_at]])
    );
}

#[test]
fn free_text_subject_and_default_grade() {
    let workspace = temp_dir("gradesheet-submit-free-text");
    let mut sc = open_workspace(&workspace);
    let result = request_ok(
        &mut sc,
        "1",
        "grades.submit",
        json!({
            "date": "2025-11-29",
            "subject": "Басқа пән (төменге жазыңыз)",
            "otherSubject": "  Робототехника ",
            "student": "Алпысбаев Саят",
        }),
    );
    assert_eq!(result["record"]["subject"], json!("Робототехника"));
    assert_eq!(result["record"]["grade"], json!(75.0));
}

#[test]
fn placeholder_selections_fail_without_writing() {
    let workspace = temp_dir("gradesheet-submit-placeholders");
    let mut sc = open_workspace(&workspace);

    let cases = [
        ("1", "Пәнді таңдаңыз...", "Ардабек Ерлан", 80.0, "subject"),
        ("2", "Бүгін сабақ жоқ", "Ардабек Ерлан", 80.0, "subject"),
        ("3", "Басқа пән (төменге жазыңыз)", "Ардабек Ерлан", 80.0, "subject"),
        ("4", "Физика", "Студентті таңдаңыз...", 80.0, "student"),
        ("5", "Физика", "Ардабек Ерлан", 101.0, "grade"),
    ];
    for (id, subject, student, grade, field) in cases {
        let resp = request(
            &mut sc,
            id,
            "grades.submit",
            json!({ "date": "2025-11-24", "subject": subject, "student": student, "grade": grade }),
        );
        assert_eq!(error_code(&resp), "validation_failed", "case {}", id);
        assert_eq!(resp["error"]["details"]["field"], json!(field), "case {}", id);
    }

    let sheet = request_ok(&mut sc, "6", "sheet.read", json!({}));
    assert_eq!(sheet["rows"], json!([]));
}

#[test]
fn strict_roster_rejects_unknown_students() {
    let workspace = temp_dir("gradesheet-submit-strict");
    write_config(
        &workspace,
        json!({ "backend": "sqlite", "strictRoster": true, "roster": ["Ардабек Ерлан"] }),
    );
    let mut sc = open_workspace(&workspace);
    let resp = request(
        &mut sc,
        "1",
        "grades.submit",
        json!({ "date": "2025-11-24", "subject": "Физика", "student": "Бейтаныс Адам", "grade": 70 }),
    );
    assert_eq!(error_code(&resp), "validation_failed");
    let _ = submit(&mut sc, "2", "Ардабек Ерлан", "Физика", 70.0);
}
