use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::activity::{ActivityMap, Window};
use crate::models::CanonicalDay;

pub const DAYS_PER_WEEK: usize = 7;

/// Days counted as "recent", today included.
const RECENT_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ActivityLevel(u8);

impl ActivityLevel {
    pub const MAX: u8 = 4;

    pub fn from_count(count: usize) -> Self {
        Self(count.min(Self::MAX as usize) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    pub day: Option<CanonicalDay>,
    pub count: usize,
    pub level: ActivityLevel,
    pub recent: bool,
    pub has_activity: bool,
}

impl GridCell {
    pub const PADDING: GridCell = GridCell {
        day: None,
        count: 0,
        level: ActivityLevel(0),
        recent: false,
        has_activity: false,
    };

    pub fn is_padding(&self) -> bool {
        self.day.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthHeader {
    pub label: String,
    pub start: usize,
    pub span: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarGrid {
    pub first_date: NaiveDate,
    pub today: NaiveDate,
    pub weeks: Vec<[GridCell; DAYS_PER_WEEK]>,
    pub month_headers: Vec<MonthHeader>,
}

impl CalendarGrid {
    pub fn build(map: &ActivityMap, today: NaiveDate) -> Self {
        let window = Window::ending(today);
        let lead = i64::from(window.start.weekday().num_days_from_sunday());
        let first_date = window.start - Duration::days(lead);
        let total_days = (today - first_date).num_days() + 1;
        let week_count = ((total_days + 6) / 7) as usize;

        let mut weeks = vec![[GridCell::PADDING; DAYS_PER_WEEK]; week_count];
        for offset in 0..week_count * DAYS_PER_WEEK {
            let date = first_date + Duration::days(offset as i64);
            if !window.contains(date) {
                continue;
            }
            let day = CanonicalDay::new(date);
            let count = map.count(day);
            let age = (today - date).num_days();
            weeks[offset / DAYS_PER_WEEK][offset % DAYS_PER_WEEK] = GridCell {
                day: Some(day),
                count,
                level: ActivityLevel::from_count(count),
                recent: count > 0 && (0..RECENT_DAYS).contains(&age),
                has_activity: count > 0,
            };
        }

        let month_headers = month_headers(&weeks);
        Self {
            first_date,
            today,
            weeks,
            month_headers,
        }
    }

    pub fn week_count(&self) -> usize {
        self.weeks.len()
    }

    pub fn cells(&self) -> impl Iterator<Item = &GridCell> {
        self.weeks.iter().flat_map(|week| week.iter())
    }

    pub fn cell(&self, day: CanonicalDay) -> Option<&GridCell> {
        let offset = (day.date() - self.first_date).num_days();
        if offset < 0 {
            return None;
        }
        let offset = offset as usize;
        self.weeks
            .get(offset / DAYS_PER_WEEK)
            .map(|week| &week[offset % DAYS_PER_WEEK])
            .filter(|cell| !cell.is_padding())
    }
}

type MonthKey = (i32, u32);

fn month_key(date: NaiveDate) -> MonthKey {
    (date.year(), date.month())
}

#[derive(Default)]
struct ColumnStats {
    counts: BTreeMap<MonthKey, usize>,
    dates: Vec<NaiveDate>,
    day_one: Option<MonthKey>,
}

impl ColumnStats {
    fn from_column(column: &[GridCell; DAYS_PER_WEEK]) -> Self {
        let mut stats = Self::default();
        for date in column.iter().filter_map(|cell| cell.day).map(|day| day.date()) {
            let key = month_key(date);
            *stats.counts.entry(key).or_default() += 1;
            stats.dates.push(date);
            if date.day() == 1 {
                stats.day_one = Some(key);
            }
        }
        stats
    }

    fn count(&self, key: MonthKey) -> usize {
        self.counts.get(&key).copied().unwrap_or(0)
    }
}

/// A month's label starts in the column holding its 1st only if the month
/// owns strictly more of that column than the other month does; otherwise
/// it starts one column later.
fn month_headers(weeks: &[[GridCell; DAYS_PER_WEEK]]) -> Vec<MonthHeader> {
    let stats: Vec<ColumnStats> = weeks.iter().map(ColumnStats::from_column).collect();
    let Some(first_column) = stats.iter().position(|column| !column.dates.is_empty()) else {
        return Vec::new();
    };

    let mut starts = vec![(month_key(stats[first_column].dates[0]), first_column)];
    let mut seen: HashSet<MonthKey> = starts.iter().map(|(key, _)| *key).collect();

    for (index, column) in stats.iter().enumerate().skip(first_column) {
        let Some(key) = column.day_one else {
            continue;
        };
        if seen.contains(&key) {
            continue;
        }
        let own = column.count(key);
        let others: usize = column.dates.len() - own;
        let start = if own > others { index } else { index + 1 };
        if start < stats.len() {
            starts.push((key, start));
            seen.insert(key);
        }
    }

    starts.sort_by_key(|(_, start)| *start);

    let mut headers = Vec::with_capacity(starts.len());
    for (position, (key, start)) in starts.iter().enumerate() {
        let limit = starts
            .get(position + 1)
            .map_or(stats.len(), |(_, next)| *next);
        let span = stats[*start..limit]
            .iter()
            .take_while(|column| column.count(*key) > 0)
            .count();
        if span == 0 {
            continue;
        }
        let Some(label_date) = stats[*start..*start + span]
            .iter()
            .flat_map(|column| column.dates.iter())
            .find(|date| month_key(**date) == *key)
        else {
            continue;
        };
        headers.push(MonthHeader {
            label: label_date.format("%b").to_string(),
            start: *start,
            span,
        });
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Project, Record};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn empty_grid(today: NaiveDate) -> CalendarGrid {
        CalendarGrid::build(&ActivityMap::empty(today), today)
    }

    fn project(value: Value) -> Arc<Project> {
        let record: Record = value.as_object().cloned().unwrap_or_default();
        Arc::new(Project::from_record(record))
    }

    fn column_of(grid: &CalendarGrid, day: NaiveDate) -> usize {
        ((day - grid.first_date).num_days() / 7) as usize
    }

    #[test]
    fn levels_bucket_counts() {
        let levels: Vec<u8> = [0, 1, 2, 3, 7]
            .into_iter()
            .map(|count| ActivityLevel::from_count(count).value())
            .collect();
        assert_eq!(levels, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn every_weekday_yields_365_dated_cells() {
        for offset in 0..7 {
            let today = date(2024, 3, 15) + Duration::days(offset);
            let grid = empty_grid(today);
            let weeks = grid.week_count();
            let dated = grid.cells().filter(|cell| !cell.is_padding()).count();
            let padding = grid.cells().filter(|cell| cell.is_padding()).count();

            assert_eq!(grid.first_date.weekday().num_days_from_sunday(), 0);
            assert_eq!(dated, 365, "today {today}");
            assert_eq!(padding, weeks * 7 - 365);

            let lead = Window::ending(today).start.weekday().num_days_from_sunday() as usize;
            let trail = 6 - today.weekday().num_days_from_sunday() as usize;
            assert!(grid.weeks[0][..lead].iter().all(GridCell::is_padding));
            assert!(!grid.weeks[0][lead].is_padding());
            let last = &grid.weeks[weeks - 1];
            assert!(last[DAYS_PER_WEEK - trail..].iter().all(GridCell::is_padding));
            assert_eq!(last[DAYS_PER_WEEK - 1 - trail].day, Some(CanonicalDay::new(today)));
            assert!(grid.weeks[1..weeks - 1]
                .iter()
                .all(|week| week.iter().all(|cell| !cell.is_padding())));
        }
    }

    #[test]
    fn cells_carry_counts_levels_and_recency() {
        let today = date(2024, 3, 15);
        let projects = vec![
            project(json!({ "name": "a", "date": "2024-03-15" })),
            project(json!({ "name": "b", "date": "2024-03-09" })),
            project(json!({ "name": "c", "date": "2024-03-09" })),
            project(json!({ "name": "d", "date": "2024-03-08" })),
        ];
        let map = ActivityMap::build(&projects, &[], &[], today);
        let grid = CalendarGrid::build(&map, today);

        let cell = |s: &str| *grid.cell(s.parse().unwrap()).unwrap();
        assert!(cell("2024-03-15").recent);
        assert_eq!(cell("2024-03-09").level.value(), 2);
        assert!(cell("2024-03-09").recent);
        assert!(cell("2024-03-08").has_activity);
        assert!(!cell("2024-03-08").recent);
        assert!(!cell("2024-03-14").has_activity);
        assert!(!cell("2024-03-14").recent);
        assert!(grid.cell("2024-03-16".parse().unwrap()).is_none());
    }

    #[test]
    fn minority_first_day_defers_to_next_column() {
        // Sun 2025-02-23 .. Sat 2025-03-01: six February days, one March day.
        let grid = empty_grid(date(2025, 6, 15));
        let column = column_of(&grid, date(2025, 2, 23));
        assert_eq!(column_of(&grid, date(2025, 3, 1)), column);

        let feb = grid.month_headers.iter().find(|h| h.label == "Feb").unwrap();
        let mar = grid.month_headers.iter().find(|h| h.label == "Mar").unwrap();
        assert_eq!(feb.start + feb.span - 1, column);
        assert_eq!(mar.start, column + 1);
    }

    #[test]
    fn majority_first_day_takes_its_column() {
        // Sun 2024-09-29 .. Sat 2024-10-05: two September days, five October days.
        let grid = empty_grid(date(2025, 6, 15));
        let column = column_of(&grid, date(2024, 10, 1));
        let sep = grid.month_headers.iter().find(|h| h.label == "Sep").unwrap();
        let oct = grid.month_headers.iter().find(|h| h.label == "Oct").unwrap();
        assert_eq!(oct.start, column);
        assert_eq!(sep.start + sep.span, column);
    }

    #[test]
    fn mixed_column_header_takes_its_own_month_label() {
        // The Oct header starts on a column whose first dated cell is Sep 29.
        let grid = empty_grid(date(2025, 6, 15));
        let column = column_of(&grid, date(2024, 9, 29));
        let header = grid
            .month_headers
            .iter()
            .find(|h| h.start == column)
            .unwrap();

        assert_eq!(header.label, "Oct");
        assert_eq!(column_of(&grid, date(2024, 10, 31)), header.start + header.span - 1);
    }

    #[test]
    fn tied_first_column_defers() {
        // Window starts Fri 2025-02-28; the first column holds Feb 28 and Mar 1.
        let grid = empty_grid(date(2026, 2, 27));
        assert_eq!(grid.month_headers[0], MonthHeader { label: "Feb".into(), start: 0, span: 1 });
        assert_eq!(grid.month_headers[1].label, "Mar");
        assert_eq!(grid.month_headers[1].start, 1);
    }

    #[test]
    fn headers_tile_all_dated_columns() {
        let base = date(2024, 1, 1);
        for offset in 0..400 {
            let today = base + Duration::days(offset);
            let grid = empty_grid(today);
            let headers = &grid.month_headers;

            assert_eq!(headers.first().map(|h| h.start), Some(0), "today {today}");
            for pair in headers.windows(2) {
                assert_eq!(pair[0].start + pair[0].span, pair[1].start, "today {today}");
            }
            let last = headers.last().unwrap();
            assert_eq!(last.start + last.span, grid.week_count(), "today {today}");
            assert!(headers.iter().all(|h| h.span > 0));
        }
    }

    #[test]
    fn build_leaves_map_untouched() {
        let today = date(2024, 3, 15);
        let projects = vec![project(json!({ "name": "a", "date": "2024-03-01" }))];
        let map = ActivityMap::build(&projects, &[], &[], today);
        let before = map.total_activities();
        let _ = CalendarGrid::build(&map, today);
        assert_eq!(map.total_activities(), before);
    }
}
