pub const CHOOSE_STUDENT: &str = "Студентті таңдаңыз...";

/// Class БҚ2503, in register order.
pub const DEFAULT_ROSTER: [&str; 11] = [
    "Ардабек Ерлан",
    "Құрманбай Рамазан",
    "Қабиден Йусуф",
    "Алпысбаев Саят",
    "Асқархан Алихан",
    "Әділхан Ахметжан",
    "Орнбеков Батыржан",
    "Айкимбай Джалил",
    "Тілеубек Нұрислам",
    "Бахриден Жанат",
    "Сарсенбай Ахмет",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    names: Vec<String>,
}

impl Default for Roster {
    fn default() -> Self {
        Roster::new(DEFAULT_ROSTER.iter().map(|s| s.to_string()).collect())
    }
}

impl Roster {
    /// Blank names and stray copies of the placeholder are dropped.
    pub fn new(names: Vec<String>) -> Self {
        let names = names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty() && n != CHOOSE_STUDENT)
            .collect();
        Roster { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name.trim())
    }

    /// Picker options: placeholder first, then the roster.
    pub fn options(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.names.len() + 1);
        out.push(CHOOSE_STUDENT.to_string());
        out.extend(self.names.iter().cloned());
        out
    }
}
