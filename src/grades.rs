use crate::roster::{Roster, CHOOSE_STUDENT};
use crate::schedule::{CHOOSE_SUBJECT, FREE_TEXT, NO_CLASS};
use crate::store::{CellValue, SheetStore, SheetTarget, StoreError};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use std::fmt;
use tracing::{info, warn};

pub const DEFAULT_GRADE: f64 = 75.0;
pub const GRADE_MIN: f64 = 0.0;
pub const GRADE_MAX: f64 = 100.0;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What the entry form sends, before any checks.
#[derive(Debug, Clone)]
pub struct GradeSubmission {
    pub date: NaiveDate,
    pub subject: String,
    pub other_subject: Option<String>,
    pub student: String,
    pub grade: f64,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeRecord {
    pub date: NaiveDate,
    pub subject: String,
    pub student: String,
    pub grade: f64,
    pub comment: String,
    pub recorded_at: NaiveDateTime,
}

impl GradeRecord {
    /// Row in sheet column order: date, subject, student, grade, comment, recorded_at.
    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.date.format(DATE_FORMAT).to_string()),
            CellValue::Text(self.subject.clone()),
            CellValue::Text(self.student.clone()),
            CellValue::Number(self.grade),
            CellValue::Text(self.comment.clone()),
            CellValue::Text(self.recorded_at.format(TIMESTAMP_FORMAT).to_string()),
        ]
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "date": self.date.format(DATE_FORMAT).to_string(),
            "subject": self.subject,
            "student": self.student,
            "grade": self.grade,
            "comment": self.comment,
            "recordedAt": self.recorded_at.format(TIMESTAMP_FORMAT).to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingSubject,
    MissingStudent,
    UnknownStudent(String),
    GradeOutOfRange(f64),
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingSubject => "subject",
            ValidationError::MissingStudent | ValidationError::UnknownStudent(_) => "student",
            ValidationError::GradeOutOfRange(_) => "grade",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingSubject => write!(f, "'Пәнді' таңдаңыз немесе жазыңыз."),
            ValidationError::MissingStudent => write!(f, "'Студентті' таңдаңыз."),
            ValidationError::UnknownStudent(name) => {
                write!(f, "'{}' тізімде жоқ.", name)
            }
            ValidationError::GradeOutOfRange(v) => {
                write!(f, "Баға {}..{} аралығында болуы керек (берілді: {}).", GRADE_MIN, GRADE_MAX, v)
            }
        }
    }
}

#[derive(Debug)]
pub enum SubmitError {
    Validation(ValidationError),
    Store(StoreError),
}

/// The free-text option stands for whatever was typed next to it.
pub fn resolve_subject(subject: &str, other_subject: Option<&str>) -> String {
    if subject == FREE_TEXT {
        other_subject.unwrap_or("").trim().to_string()
    } else {
        subject.trim().to_string()
    }
}

/// Checks a submission and returns the resolved subject and student.
pub fn validate(
    sub: &GradeSubmission,
    roster: &Roster,
    strict_roster: bool,
) -> Result<(String, String), ValidationError> {
    let subject = resolve_subject(&sub.subject, sub.other_subject.as_deref());
    if subject.is_empty() || subject == CHOOSE_SUBJECT || subject == NO_CLASS {
        return Err(ValidationError::MissingSubject);
    }

    let student = sub.student.trim().to_string();
    if student.is_empty() || student == CHOOSE_STUDENT {
        return Err(ValidationError::MissingStudent);
    }
    if strict_roster && !roster.contains(&student) {
        return Err(ValidationError::UnknownStudent(student));
    }

    if !sub.grade.is_finite() || sub.grade < GRADE_MIN || sub.grade > GRADE_MAX {
        return Err(ValidationError::GradeOutOfRange(sub.grade));
    }
    Ok((subject, student))
}

/// Validates, stamps and appends one grade row.
///
/// `clock` is read after validation, immediately before the append, so the
/// stamp reflects when the row was written. A single append is attempted.
pub fn submit(
    store: &dyn SheetStore,
    target: &SheetTarget,
    sub: &GradeSubmission,
    roster: &Roster,
    strict_roster: bool,
    clock: impl FnOnce() -> NaiveDateTime,
) -> Result<GradeRecord, SubmitError> {
    let (subject, student) = validate(sub, roster, strict_roster).map_err(SubmitError::Validation)?;

    let record = GradeRecord {
        date: sub.date,
        subject,
        student,
        grade: sub.grade,
        comment: sub.comment.clone(),
        recorded_at: clock(),
    };
    if let Err(e) = store.append_row(target, &record.to_row()) {
        warn!(sheet = %target.sheet, error = %e, "grade append failed");
        return Err(SubmitError::Store(e));
    }
    info!(
        sheet = %target.sheet,
        student = %record.student,
        subject = %record.subject,
        "grade recorded"
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::SCHEMA_HEADER;
    use crate::store::memory::MemoryStore;

    fn target() -> SheetTarget {
        SheetTarget::new("Grades", "Sheet1")
    }

    fn store() -> MemoryStore {
        let s = MemoryStore::new();
        s.ensure_worksheet(
            &target(),
            &SCHEMA_HEADER.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
        );
        s
    }

    fn submission() -> GradeSubmission {
        GradeSubmission {
            date: NaiveDate::from_ymd_opt(2025, 11, 24).expect("date"),
            subject: "Физика".into(),
            other_subject: None,
            student: "Ардабек Ерлан".into(),
            grade: 88.0,
            comment: "СӨЖ-1".into(),
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 24)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .expect("timestamp")
    }

    #[test]
    fn placeholder_subject_is_rejected_without_a_store_call() {
        let s = store();
        let mut sub = submission();
        sub.subject = CHOOSE_SUBJECT.into();
        let r = submit(&s, &target(), &sub, &Roster::default(), false, || at(9, 0, 0));
        assert!(matches!(
            r,
            Err(SubmitError::Validation(ValidationError::MissingSubject))
        ));
        assert_eq!(s.write_count(), 0);
    }

    #[test]
    fn placeholder_student_is_rejected_without_a_store_call() {
        let s = store();
        let mut sub = submission();
        sub.student = CHOOSE_STUDENT.into();
        let r = submit(&s, &target(), &sub, &Roster::default(), false, || at(9, 0, 0));
        match r {
            Err(SubmitError::Validation(e)) => assert_eq!(e.field(), "student"),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(s.write_count(), 0);
    }

    #[test]
    fn free_text_subject_resolves_and_blank_is_rejected() {
        assert_eq!(resolve_subject(FREE_TEXT, Some("  Астрономия ")), "Астрономия");
        assert_eq!(resolve_subject("Химия", Some("ignored")), "Химия");

        let mut sub = submission();
        sub.subject = FREE_TEXT.into();
        sub.other_subject = Some("   ".into());
        assert_eq!(
            validate(&sub, &Roster::default(), false),
            Err(ValidationError::MissingSubject)
        );

        sub.subject = NO_CLASS.into();
        assert_eq!(
            validate(&sub, &Roster::default(), false),
            Err(ValidationError::MissingSubject)
        );
    }

    #[test]
    fn strict_roster_and_grade_range() {
        let mut sub = submission();
        sub.student = "Белгісіз Студент".into();
        assert!(validate(&sub, &Roster::default(), false).is_ok());
        assert_eq!(
            validate(&sub, &Roster::default(), true),
            Err(ValidationError::UnknownStudent("Белгісіз Студент".into()))
        );

        let mut sub = submission();
        sub.grade = 100.5;
        assert_eq!(validate(&sub, &Roster::default(), false).unwrap_err().field(), "grade");
        sub.grade = 0.0;
        assert!(validate(&sub, &Roster::default(), false).is_ok());
    }

    #[test]
    fn appended_row_round_trips_in_schema_order() {
        let s = store();
        let record = submit(&s, &target(), &submission(), &Roster::default(), false, || {
            at(10, 15, 30)
        })
        .expect("submit");
        assert_eq!(record.recorded_at, at(10, 15, 30));

        let t = s.read_all(&target()).expect("read");
        assert_eq!(
            t.rows,
            vec![vec![
                "2025-11-24".to_string(),
                "Физика".to_string(),
                "Ардабек Ерлан".to_string(),
                "88".to_string(),
                "СӨЖ-1".to_string(),
                "2025-11-24 10:15:30".to_string(),
            ]]
        );
    }

    #[test]
    fn failed_append_is_reported_and_nothing_is_written() {
        let s = store();
        s.set_fail_writes(true);
        let r = submit(&s, &target(), &submission(), &Roster::default(), false, || {
            at(10, 0, 0)
        });
        assert!(matches!(r, Err(SubmitError::Store(StoreError::Transport(_)))));
        assert!(s.read_all(&target()).expect("read").rows.is_empty());
    }
}
