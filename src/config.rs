use crate::roster::Roster;
use crate::schedule::ScheduleTable;
use crate::sheet::{COL_STUDENT, SCHEMA_HEADER};
use crate::store::SheetTarget;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "gradesheet.json";
pub const TOKEN_ENV: &str = "GRADESHEETD_GOOGLE_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Google,
    Sqlite,
    Memory,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Google => "google",
            Backend::Sqlite => "sqlite",
            Backend::Memory => "memory",
        }
    }
}

/// Workspace settings, read from `gradesheet.json`. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub backend: Backend,
    pub sheet_name: String,
    pub worksheet: String,
    pub student_column: String,
    pub grid_ttl_secs: u64,
    pub analytics_ttl_secs: u64,
    pub strict_roster: bool,
    pub roster: Option<Vec<String>>,
    pub schedule: Option<ScheduleTable>,
    #[serde(skip_serializing)]
    pub google_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            backend: Backend::default(),
            sheet_name: "Студенттердің бағалары".to_string(),
            worksheet: "Sheet1".to_string(),
            student_column: SCHEMA_HEADER[COL_STUDENT].to_string(),
            grid_ttl_secs: 60,
            analytics_ttl_secs: 600,
            strict_roster: false,
            roster: None,
            schedule: None,
            google_token: None,
        }
    }
}

impl AppConfig {
    /// Reads `<workspace>/gradesheet.json` when present, then applies the
    /// credential from the environment, which takes precedence.
    pub fn load(workspace: &Path) -> anyhow::Result<Self> {
        let path = workspace.join(CONFIG_FILE_NAME);
        let mut cfg = if path.is_file() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str::<AppConfig>(&raw)
                .with_context(|| format!("parse {}", path.display()))?
        } else {
            AppConfig::default()
        };
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                cfg.google_token = Some(token);
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.sheet_name.trim().is_empty() {
            anyhow::bail!("sheetName must not be empty");
        }
        if self.worksheet.trim().is_empty() {
            anyhow::bail!("worksheet must not be empty");
        }
        if self.student_column.trim().is_empty() {
            anyhow::bail!("studentColumn must not be empty");
        }
        Ok(())
    }

    pub fn target(&self) -> SheetTarget {
        SheetTarget::new(self.sheet_name.clone(), self.worksheet.clone())
    }

    pub fn grid_ttl(&self) -> Duration {
        Duration::from_secs(self.grid_ttl_secs)
    }

    pub fn analytics_ttl(&self) -> Duration {
        Duration::from_secs(self.analytics_ttl_secs)
    }

    pub fn roster(&self) -> Roster {
        match &self.roster {
            Some(names) => Roster::new(names.clone()),
            None => Roster::default(),
        }
    }

    pub fn schedule(&self) -> ScheduleTable {
        self.schedule.clone().unwrap_or_default()
    }

    /// Effective settings for display; the credential is reported only as present or not.
    pub fn redacted_json(&self) -> serde_json::Value {
        let mut v = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        v["googleTokenSet"] = json!(self.google_token.is_some());
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{ "backend": "memory", "gridTtlSecs": 5 }"#).expect("parse");
        assert_eq!(cfg.backend, Backend::Memory);
        assert_eq!(cfg.grid_ttl(), Duration::from_secs(5));
        assert_eq!(cfg.analytics_ttl(), Duration::from_secs(600));
        assert_eq!(cfg.student_column, "Студент");
        assert_eq!(cfg.target().sheet, "Студенттердің бағалары");
    }

    #[test]
    fn missing_file_targets_the_google_backend() {
        let cfg = AppConfig::load(&std::env::temp_dir().join("gradesheet-no-such-workspace"))
            .expect("defaults");
        assert_eq!(cfg.backend, Backend::Google);
    }

    #[test]
    fn redacted_json_hides_token() {
        let cfg = AppConfig {
            google_token: Some("secret".into()),
            ..AppConfig::default()
        };
        let v = cfg.redacted_json();
        assert!(v.get("googleToken").is_none());
        assert_eq!(v["googleTokenSet"], json!(true));
        assert!(!v.to_string().contains("secret"));
    }

    #[test]
    fn blank_sheet_name_is_rejected() {
        let cfg = AppConfig {
            sheet_name: " ".into(),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
