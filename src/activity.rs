use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate};
use tracing::debug;

use crate::models::{name_key, Activity, AdvancementEvent, AdvancementRow, CanonicalDay, Project};

/// Days covered by the calendar, today included.
pub const WINDOW_DAYS: i64 = 365;

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn ending(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(WINDOW_DAYS - 1),
            end: today,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone)]
pub struct ActivityMap {
    window: Window,
    days: BTreeMap<CanonicalDay, Vec<Activity>>,
}

impl ActivityMap {
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            window: Window::ending(today),
            days: BTreeMap::new(),
        }
    }

    pub fn build(
        projects: &[Arc<Project>],
        events: &[AdvancementEvent],
        rows: &[AdvancementRow],
        today: NaiveDate,
    ) -> Self {
        let mut map = Self::empty(today);
        let mut by_name: HashMap<String, Arc<Project>> = HashMap::new();

        for project in projects {
            let key = name_key(&project.name);
            if !key.is_empty() {
                by_name.insert(key, Arc::clone(project));
            }
            if let Some(day) = project.date() {
                map.insert(day, Activity::Project(Arc::clone(project)));
            }
        }

        let resolve = |name: &str| match by_name.get(&name_key(name)) {
            Some(project) => Activity::Project(Arc::clone(project)),
            None => Activity::marker(name),
        };

        for event in events {
            if let Some(day) = event.date() {
                map.insert(day, resolve(&event.project_name));
            }
        }

        for row in rows.iter().filter(|row| row.is_initial()) {
            if let Some(day) = row.date() {
                map.insert(day, resolve(&row.project_name));
            }
        }

        debug!(
            projects = projects.len(),
            events = events.len(),
            rows = rows.len(),
            active_days = map.days.len(),
            "activity map built"
        );
        map
    }

    /// Adds `activity` under `day` unless it falls outside the window or the
    /// day already lists the same project.
    fn insert(&mut self, day: CanonicalDay, activity: Activity) {
        if !self.window.contains(day.date()) {
            return;
        }
        let list = self.days.entry(day).or_default();
        if !list.iter().any(|existing| existing.is_duplicate_of(&activity)) {
            list.push(activity);
        }
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn day(&self, day: CanonicalDay) -> &[Activity] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, day: CanonicalDay) -> usize {
        self.day(day).len()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&CanonicalDay, &Vec<Activity>)> {
        self.days.iter()
    }

    pub fn active_days(&self) -> usize {
        self.days.len()
    }

    pub fn total_activities(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn project(value: Value) -> Arc<Project> {
        Arc::new(Project::from_record(record(value)))
    }

    fn event(value: Value) -> AdvancementEvent {
        AdvancementEvent::from_record(record(value))
    }

    fn row(value: Value) -> AdvancementRow {
        AdvancementRow::from_record(record(value))
    }

    fn day(s: &str) -> CanonicalDay {
        s.parse().unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn window_spans_365_days_inclusive() {
        let window = Window::ending(today());
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2023, 3, 17).unwrap());
        assert_eq!((window.end - window.start).num_days() + 1, WINDOW_DAYS);
    }

    #[test]
    fn projects_outside_window_are_dropped() {
        let projects = vec![
            project(json!({ "name": "Old", "date": "2023-03-16" })),
            project(json!({ "name": "Edge", "date": "2023-03-17" })),
            project(json!({ "name": "Today", "date": "2024-03-15" })),
            project(json!({ "name": "Future", "date": "2024-03-16" })),
            project(json!({ "name": "Undated" })),
        ];
        let map = ActivityMap::build(&projects, &[], &[], today());

        assert_eq!(map.active_days(), 2);
        assert_eq!(map.count(day("2023-03-17")), 1);
        assert_eq!(map.count(day("2024-03-15")), 1);
        let window = map.window();
        assert!(map.iter().all(|(d, _)| window.contains(d.date())));
    }

    #[test]
    fn same_day_duplicates_collapse() {
        let projects = vec![
            project(json!({ "id": 7, "name": "Alpha", "date": "2024-03-10" })),
            project(json!({ "id": "7", "name": "Renamed", "date": "2024-03-10" })),
            project(json!({ "name": " beta ", "date": "2024-03-10" })),
            project(json!({ "name": "BETA", "addedDate": "2024/03/10" })),
            project(json!({ "id": 8, "name": "Alpha", "date": "2024-03-10" })),
        ];
        let map = ActivityMap::build(&projects, &[], &[], today());
        let names: Vec<&str> = map.day(day("2024-03-10")).iter().map(Activity::name).collect();

        assert_eq!(names, vec!["Alpha", "beta", "Alpha"]);
    }

    #[test]
    fn events_resolve_to_known_projects() {
        let projects = vec![project(json!({ "name": "Sheet Sync", "date": "2024-03-01" }))];
        let events = vec![
            event(json!({ "projectName": "sheet sync ", "date": "2024-03-01" })),
            event(json!({ "Project Name": "sheet sync", "Date": "2024-03-05" })),
            event(json!({ "project": "Mystery", "date": "2024-03-05" })),
            event(json!({ "date": "2024-03-06" })),
            event(json!({ "projectName": "Sheet Sync", "date": "2020-01-01" })),
        ];
        let map = ActivityMap::build(&projects, &events, &[], today());

        assert_eq!(map.count(day("2024-03-01")), 1);

        let fifth = map.day(day("2024-03-05"));
        assert_eq!(fifth.len(), 2);
        assert!(matches!(&fifth[0], Activity::Project(p) if p.name == "Sheet Sync"));
        assert!(matches!(&fifth[1], Activity::Marker { name } if name == "Mystery"));

        let sixth = map.day(day("2024-03-06"));
        assert_eq!(sixth[0].name(), Activity::UNNAMED_MARKER);
        assert_eq!(map.total_activities(), 4);
    }

    #[test]
    fn only_initial_advancement_rows_count() {
        let projects = vec![project(json!({ "name": "Ledger" }))];
        let rows = vec![
            row(json!({ "projectName": "Ledger", "date": "2024-02-01", "advancementCount": 0 })),
            row(json!({ "projectName": "Ledger", "date": "2024-02-02", "advancementCount": 3 })),
            row(json!({ "projectName": "Ghost", "date": "2024-02-03", "count": "1" })),
            row(json!({ "projectName": "Ghost", "date": "2024-02-04" })),
        ];
        let map = ActivityMap::build(&projects, &[], &rows, today());

        assert!(matches!(&map.day(day("2024-02-01"))[0], Activity::Project(p) if p.name == "Ledger"));
        assert_eq!(map.count(day("2024-02-02")), 0);
        assert_eq!(map.count(day("2024-02-03")), 0);
        assert!(matches!(&map.day(day("2024-02-04"))[0], Activity::Marker { name } if name == "Ghost"));
    }

    #[test]
    fn later_projects_win_name_lookup() {
        let projects = vec![
            project(json!({ "id": "a", "name": "Twin" })),
            project(json!({ "id": "b", "name": "twin" })),
        ];
        let events = vec![event(json!({ "projectName": "TWIN", "date": "2024-03-02" }))];
        let map = ActivityMap::build(&projects, &events, &[], today());

        assert_eq!(map.day(day("2024-03-02"))[0].id(), Some("b"));
    }
}
