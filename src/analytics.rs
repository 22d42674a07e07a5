use crate::grades::{DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::sheet::{
    Table, COL_COMMENT, COL_DATE, COL_GRADE, COL_RECORDED_AT, COL_STUDENT, COL_SUBJECT,
    SCHEMA_HEADER,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// One sheet row with typed fields. Cells that do not parse are `None`
/// rather than failing the whole read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub date: String,
    pub subject: String,
    pub student: String,
    pub grade: Option<f64>,
    pub comment: String,
    pub recorded_at: String,
    #[serde(skip)]
    parsed_date: Option<NaiveDate>,
    #[serde(skip)]
    parsed_recorded_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub student: String,
    pub entries: usize,
    pub graded: usize,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub last_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub subject: String,
    pub graded: usize,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_entries: usize,
    pub missing_grades: usize,
    pub students: Vec<StudentStats>,
    pub subjects: Vec<SubjectStats>,
    pub recent: Vec<Entry>,
}

/// Accepts `85`, `85.5` and the comma-decimal `85,5` some sheet locales show.
pub fn parse_grade(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(s, "%d.%m.%Y"))
        .ok()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok()
}

/// Column positions by header name, falling back to the append order when a
/// header was renamed by hand.
fn locate_columns(table: &Table) -> [usize; 6] {
    let mut cols = [
        COL_DATE,
        COL_SUBJECT,
        COL_STUDENT,
        COL_GRADE,
        COL_COMMENT,
        COL_RECORDED_AT,
    ];
    for (i, name) in SCHEMA_HEADER.iter().enumerate() {
        if let Some(pos) = table.column(name) {
            cols[i] = pos;
        }
    }
    cols
}

pub fn parse_entries(table: &Table) -> Vec<Entry> {
    let cols = locate_columns(table);
    let cell = |row: &Vec<String>, i: usize| row.get(cols[i]).cloned().unwrap_or_default();
    table
        .rows
        .iter()
        .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
        .map(|r| {
            let date = cell(r, COL_DATE);
            let recorded_at = cell(r, COL_RECORDED_AT);
            Entry {
                parsed_date: parse_date(&date),
                parsed_recorded_at: parse_timestamp(&recorded_at),
                grade: parse_grade(&cell(r, COL_GRADE)),
                subject: cell(r, COL_SUBJECT).trim().to_string(),
                student: cell(r, COL_STUDENT).trim().to_string(),
                comment: cell(r, COL_COMMENT),
                date,
                recorded_at,
            }
        })
        .collect()
}

#[derive(Default)]
struct Acc {
    entries: usize,
    sum: f64,
    graded: usize,
    min: Option<f64>,
    max: Option<f64>,
    last_date: Option<NaiveDate>,
}

impl Acc {
    fn add(&mut self, e: &Entry) {
        self.entries += 1;
        if let Some(g) = e.grade {
            self.sum += g;
            self.graded += 1;
            self.min = Some(self.min.map_or(g, |m| m.min(g)));
            self.max = Some(self.max.map_or(g, |m| m.max(g)));
        }
        if let Some(d) = e.parsed_date {
            if self.last_date.map(|l| d > l).unwrap_or(true) {
                self.last_date = Some(d);
            }
        }
    }

    /// Missing grades are excluded from the denominator.
    fn average(&self) -> Option<f64> {
        if self.graded == 0 {
            None
        } else {
            Some(self.sum / self.graded as f64)
        }
    }
}

/// Newest first by write stamp, then by lesson date; unparseable stamps sort last.
fn recency(a: &Entry, b: &Entry) -> Ordering {
    b.parsed_recorded_at
        .cmp(&a.parsed_recorded_at)
        .then_with(|| b.parsed_date.cmp(&a.parsed_date))
}

pub fn summarize(table: &Table, recent_limit: usize) -> Summary {
    let entries = parse_entries(table);

    let mut by_student: BTreeMap<String, Acc> = BTreeMap::new();
    let mut by_subject: BTreeMap<String, Acc> = BTreeMap::new();
    for e in entries.iter().filter(|e| !e.student.is_empty()) {
        by_student.entry(e.student.clone()).or_default().add(e);
    }
    for e in entries.iter().filter(|e| !e.subject.is_empty()) {
        by_subject.entry(e.subject.clone()).or_default().add(e);
    }

    let students = by_student
        .into_iter()
        .map(|(student, acc)| StudentStats {
            student,
            entries: acc.entries,
            graded: acc.graded,
            average: acc.average(),
            min: acc.min,
            max: acc.max,
            last_date: acc.last_date.map(|d| d.format(DATE_FORMAT).to_string()),
        })
        .collect();
    let subjects = by_subject
        .into_iter()
        .map(|(subject, acc)| SubjectStats {
            subject,
            graded: acc.graded,
            average: acc.average(),
        })
        .collect();

    let missing_grades = entries.iter().filter(|e| e.grade.is_none()).count();
    let total_entries = entries.len();
    let mut recent = entries;
    // Option orders None first; flip so entries without a stamp go last.
    recent.sort_by(|a, b| match (a.parsed_recorded_at, b.parsed_recorded_at) {
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => recency(a, b),
    });
    recent.truncate(recent_limit);

    Summary {
        total_entries,
        missing_grades,
        students,
        subjects,
        recent,
    }
}
