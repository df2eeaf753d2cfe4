use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::dates;

pub type Record = Map<String, Value>;

/// Field aliases per record kind, highest priority first.
pub mod fields {
    pub const PROJECT_ID: &[&str] = &["id"];
    pub const PROJECT_NAME: &[&str] = &["name", "Project Name", "projectName", "Project"];
    pub const PROJECT_CATEGORY: &[&str] = &["category", "Category"];
    pub const PROJECT_DESCRIPTION: &[&str] = &["description", "Description"];
    pub const PROJECT_STATUS: &[&str] = &["status", "Status"];
    pub const PROJECT_LINK: &[&str] = &["link", "Link"];
    pub const PROJECT_DATE: &[&str] = &["date", "addedDate", "added", "Date"];
    pub const PROJECT_TECH_STACK: &[&str] = &["techStack", "Tech Stack"];
    pub const PROJECT_DIFFICULTY: &[&str] = &["difficulty", "Difficulty"];
    pub const PROJECT_YEAR: &[&str] = &["year", "Year"];
    pub const PROJECT_OUTCOME: &[&str] = &["outcome", "Outcome"];

    pub const ADVANCEMENT_DATE: &[&str] = &["date", "Date"];
    pub const ADVANCEMENT_PROJECT: &[&str] = &["projectName", "Project Name", "project"];
    pub const ADVANCEMENT_COUNT: &[&str] = &["advancementCount", "AdvancementCount", "count"];
}

/// Sheet cells are loosely typed; a blank string, zero, false or null all
/// count as "not filled in".
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|v| v != 0.0),
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

pub fn first_present<'a>(record: &'a Record, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|alias| record.get(*alias))
        .find(|value| is_truthy(value))
}

pub fn first_text(record: &Record, aliases: &[&str]) -> Option<String> {
    first_present(record, aliases).and_then(text_of)
}

pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalDay(NaiveDate);

impl CanonicalDay {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for CanonicalDay {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for CanonicalDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for CanonicalDay {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map(Self)
    }
}

impl Serialize for CanonicalDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CanonicalDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tech_stack: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip)]
    pub record: Record,
}

impl Project {
    pub fn from_record(record: Record) -> Self {
        let tech_stack = first_text(&record, fields::PROJECT_TECH_STACK)
            .map(|stack| {
                stack
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: first_text(&record, fields::PROJECT_ID),
            name: first_text(&record, fields::PROJECT_NAME).unwrap_or_default(),
            category: first_text(&record, fields::PROJECT_CATEGORY).unwrap_or_default(),
            description: first_text(&record, fields::PROJECT_DESCRIPTION).unwrap_or_default(),
            status: first_text(&record, fields::PROJECT_STATUS),
            link: first_text(&record, fields::PROJECT_LINK),
            tech_stack,
            difficulty: first_text(&record, fields::PROJECT_DIFFICULTY),
            year: first_text(&record, fields::PROJECT_YEAR),
            outcome: first_text(&record, fields::PROJECT_OUTCOME),
            record,
        }
    }

    pub fn date(&self) -> Option<CanonicalDay> {
        dates::normalize_record(&self.record, fields::PROJECT_DATE)
    }
}

#[derive(Debug, Clone)]
pub struct AdvancementEvent {
    pub project_name: String,
    pub record: Record,
}

impl AdvancementEvent {
    pub fn from_record(record: Record) -> Self {
        Self {
            project_name: first_text(&record, fields::ADVANCEMENT_PROJECT).unwrap_or_default(),
            record,
        }
    }

    pub fn date(&self) -> Option<CanonicalDay> {
        dates::normalize_record(&self.record, fields::ADVANCEMENT_DATE)
    }
}

#[derive(Debug, Clone)]
pub struct AdvancementRow {
    pub project_name: String,
    /// `None` when the count cell holds something that is not a number.
    pub advancement_count: Option<f64>,
    pub record: Record,
}

impl AdvancementRow {
    pub fn from_record(record: Record) -> Self {
        let advancement_count = match first_present(&record, fields::ADVANCEMENT_COUNT) {
            None => Some(0.0),
            Some(Value::Number(number)) => number.as_f64(),
            Some(Value::Bool(flag)) => Some(if *flag { 1.0 } else { 0.0 }),
            Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
            Some(_) => None,
        };

        Self {
            project_name: first_text(&record, fields::ADVANCEMENT_PROJECT).unwrap_or_default(),
            advancement_count,
            record,
        }
    }

    /// Count zero marks the row that records a project's first contribution.
    pub fn is_initial(&self) -> bool {
        self.advancement_count == Some(0.0)
    }

    pub fn date(&self) -> Option<CanonicalDay> {
        dates::normalize_record(&self.record, fields::ADVANCEMENT_DATE)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Activity {
    Project(Arc<Project>),
    /// An advancement whose project name did not match any known project.
    Marker { name: String },
}

impl Activity {
    pub const UNNAMED_MARKER: &'static str = "(advancement)";

    pub fn marker(project_name: &str) -> Self {
        let name = project_name.trim();
        Activity::Marker {
            name: if name.is_empty() {
                Self::UNNAMED_MARKER.to_string()
            } else {
                name.to_string()
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Activity::Project(project) => &project.name,
            Activity::Marker { name } => name,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Activity::Project(project) => project.id.as_deref(),
            Activity::Marker { .. } => None,
        }
    }

    /// Ids decide when both sides carry one; otherwise non-empty names are
    /// compared case-insensitively.
    pub fn is_duplicate_of(&self, other: &Activity) -> bool {
        if let (Some(left), Some(right)) = (self.id(), other.id()) {
            return left == right;
        }
        let left = name_key(self.name());
        let right = name_key(other.name());
        !left.is_empty() && left == right
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: String,
    pub count: usize,
    pub active_in_window: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn project_fields_follow_alias_priority() {
        let project = Project::from_record(record(json!({
            "Project Name": "  Sheet Sync ",
            "name": "",
            "Category": "Tools",
            "techStack": "Rust, tokio , ,serde",
            "id": 42
        })));

        assert_eq!(project.name, "Sheet Sync");
        assert_eq!(project.category, "Tools");
        assert_eq!(project.id.as_deref(), Some("42"));
        assert_eq!(project.tech_stack, vec!["Rust", "tokio", "serde"]);
        assert!(project.link.is_none());
    }

    #[test]
    fn zero_id_is_not_an_identity() {
        let project = Project::from_record(record(json!({ "id": 0, "name": "x" })));
        assert!(project.id.is_none());
    }

    #[test]
    fn advancement_count_takes_first_truthy_alias() {
        let row = AdvancementRow::from_record(record(json!({
            "advancementCount": 0,
            "count": "2"
        })));
        assert_eq!(row.advancement_count, Some(2.0));
        assert!(!row.is_initial());

        let missing = AdvancementRow::from_record(record(json!({ "projectName": "a" })));
        assert!(missing.is_initial());

        let garbage = AdvancementRow::from_record(record(json!({ "count": "many" })));
        assert!(!garbage.is_initial());

        let text_zero = AdvancementRow::from_record(record(json!({ "AdvancementCount": " 0 " })));
        assert!(text_zero.is_initial());
    }

    #[test]
    fn duplicates_prefer_ids_over_names() {
        let a = Activity::Project(Arc::new(Project::from_record(record(
            json!({ "id": "1", "name": "Same" }),
        ))));
        let b = Activity::Project(Arc::new(Project::from_record(record(
            json!({ "id": "2", "name": "same" }),
        ))));
        let marker = Activity::marker(" SAME ");

        assert!(!a.is_duplicate_of(&b));
        assert!(a.is_duplicate_of(&marker));
        assert!(Activity::marker("").is_duplicate_of(&Activity::marker("  ")));
    }

    #[test]
    fn canonical_day_round_trips_as_text() {
        let day: CanonicalDay = "2024-03-09".parse().unwrap();
        assert_eq!(day.to_string(), "2024-03-09");
        assert_eq!(serde_json::to_value(day).unwrap(), json!("2024-03-09"));
        assert!("2024-3-9x".parse::<CanonicalDay>().is_err());
    }
}
