use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CHOOSE_SUBJECT: &str = "Пәнді таңдаңыз...";
pub const NO_CLASS: &str = "Бүгін сабақ жоқ";
pub const FREE_TEXT: &str = "Басқа пән (төменге жазыңыз)";

/// One subject slot that alternates on ISO week parity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternation {
    pub weekday: u8,
    /// Index in the base list to insert at; appended when absent.
    #[serde(default)]
    pub position: Option<usize>,
    pub even: String,
    pub odd: String,
}

/// Weekly timetable: weekday (Mon=0..Sun=6) to ordered subjects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTable {
    pub days: BTreeMap<u8, Vec<String>>,
    #[serde(default)]
    pub alternations: Vec<Alternation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySubjects {
    pub date: String,
    pub weekday: u8,
    pub iso_week: u32,
    pub even_week: bool,
    /// Subjects taught that day, schedule order, no sentinels.
    pub subjects: Vec<String>,
    /// What a subject picker should offer, sentinels included.
    pub options: Vec<String>,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ScheduleTable {
    fn default() -> Self {
        let mut days = BTreeMap::new();
        days.insert(0, owned(&["Математика", "Физика", "Қазақ тілі", "Биология"]));
        days.insert(
            1,
            owned(&["Химия", "Қазақстан тарихы", "География", "Дене шынықтыру"]),
        );
        days.insert(2, owned(&["Математика", "Қазақ әдебиеті", "Информатика"]));
        days.insert(
            3,
            owned(&["Биология", "Физика", "Ағылшын тілі", "Математика"]),
        );
        days.insert(4, owned(&["Қазақ тілі", "Химия", "Дене шынықтыру"]));
        days.insert(5, Vec::new());
        // Sunday has no entry at all.

        ScheduleTable {
            days,
            alternations: vec![
                Alternation {
                    weekday: 2,
                    position: Some(1),
                    even: "Ағылшын тілі (ауыспалы)".into(),
                    odd: "Дүниежүзі тарихы (ауыспалы)".into(),
                },
                Alternation {
                    weekday: 4,
                    position: None,
                    even: "АӘД (НВП)".into(),
                    odd: "География (ауыспалы)".into(),
                },
            ],
        }
    }
}

impl ScheduleTable {
    /// Subjects scheduled on `date`, in timetable order, with alternating
    /// slots resolved by ISO week parity.
    pub fn derive(&self, date: NaiveDate) -> Vec<String> {
        let weekday = date.weekday().num_days_from_monday() as u8;
        let even_week = date.iso_week().week() % 2 == 0;

        let mut subjects = self.days.get(&weekday).cloned().unwrap_or_default();
        for alt in self.alternations.iter().filter(|a| a.weekday == weekday) {
            let name = if even_week { &alt.even } else { &alt.odd };
            match alt.position {
                Some(pos) => subjects.insert(pos.min(subjects.len()), name.clone()),
                None => subjects.push(name.clone()),
            }
        }
        subjects
    }

    /// Picker options for `date`.
    ///
    /// A day without classes offers only the "no class" marker and the
    /// free-text escape; otherwise the "choose a subject" placeholder leads.
    pub fn subjects_for(&self, date: NaiveDate) -> Vec<String> {
        options_from(self.derive(date))
    }

    pub fn day(&self, date: NaiveDate) -> DaySubjects {
        let subjects = self.derive(date);
        let iso_week = date.iso_week().week();
        DaySubjects {
            date: date.format("%Y-%m-%d").to_string(),
            weekday: date.weekday().num_days_from_monday() as u8,
            iso_week,
            even_week: iso_week % 2 == 0,
            options: self.subjects_for(date),
            subjects,
        }
    }

    /// Monday-to-Sunday view of the ISO week containing `date`.
    /// `None` when that week runs past the representable date range.
    pub fn week(&self, date: NaiveDate) -> Option<Vec<DaySubjects>> {
        let monday =
            date.checked_sub_days(Days::new(date.weekday().num_days_from_monday() as u64))?;
        (0..7)
            .map(|i| monday.checked_add_days(Days::new(i)).map(|d| self.day(d)))
            .collect()
    }
}

fn options_from(subjects: Vec<String>) -> Vec<String> {
    if subjects.is_empty() {
        return vec![NO_CLASS.to_string(), FREE_TEXT.to_string()];
    }
    let mut out = Vec::with_capacity(subjects.len() + 2);
    out.push(CHOOSE_SUBJECT.to_string());
    out.extend(subjects);
    out.push(FREE_TEXT.to_string());
    out
}
