use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::activity::ActivityMap;
use crate::calendar::{CalendarGrid, GridCell, MonthHeader, DAYS_PER_WEEK};
use crate::interaction::cell_title;
use crate::models::{Activity, CanonicalDay, CategorySummary, Project};

const LEVEL_GLYPHS: [char; 5] = ['·', '░', '▒', '▓', '█'];
const WEEKDAY_LABELS: [&str; DAYS_PER_WEEK] = ["Sun", "", "Tue", "", "Thu", "", "Sat"];
const COLUMN_WIDTH: usize = 2;
const GUTTER: usize = 4;

pub fn summarize_by_category(projects: &[Arc<Project>], map: &ActivityMap) -> Vec<CategorySummary> {
    let window = map.window();
    let mut totals: HashMap<&str, (usize, usize)> = HashMap::new();

    for project in projects {
        let category = if project.category.is_empty() {
            "Uncategorized"
        } else {
            project.category.as_str()
        };
        let entry = totals.entry(category).or_insert((0, 0));
        entry.0 += 1;
        if project.date().is_some_and(|day| window.contains(day.date())) {
            entry.1 += 1;
        }
    }

    let mut summaries: Vec<CategorySummary> = totals
        .into_iter()
        .map(|(category, (count, active_in_window))| CategorySummary {
            category: category.to_string(),
            count,
            active_in_window,
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    summaries
}

fn glyph(cell: &GridCell) -> char {
    if cell.is_padding() {
        ' '
    } else {
        LEVEL_GLYPHS[usize::from(cell.level.value())]
    }
}

fn month_row(headers: &[MonthHeader]) -> String {
    let mut row = " ".repeat(GUTTER);
    for header in headers {
        let width = header.span * COLUMN_WIDTH;
        let label: String = header.label.chars().take(width).collect();
        let column = GUTTER + header.start * COLUMN_WIDTH;
        while row.chars().count() < column {
            row.push(' ');
        }
        let _ = write!(row, "{label:<width$}");
    }
    row.trim_end().to_string()
}

pub fn render_heatmap(grid: &CalendarGrid) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", month_row(&grid.month_headers));

    for (row, label) in WEEKDAY_LABELS.iter().enumerate() {
        let mut line = String::with_capacity(GUTTER + grid.week_count() * COLUMN_WIDTH);
        let _ = write!(line, "{label:<width$}", width = GUTTER);
        for week in &grid.weeks {
            line.push(glyph(&week[row]));
            line.push(' ');
        }
        let _ = writeln!(output, "{}", line.trim_end());
    }

    let legend: Vec<String> = LEVEL_GLYPHS.iter().map(char::to_string).collect();
    let _ = writeln!(output, "{}Less {} More", " ".repeat(GUTTER), legend.join(" "));
    output
}

fn busiest_day(map: &ActivityMap) -> Option<(CanonicalDay, usize)> {
    map.iter()
        .map(|(day, activities)| (*day, activities.len()))
        .fold(None, |best, (day, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((day, count)),
        })
}

pub fn build_report(
    projects: &[Arc<Project>],
    map: &ActivityMap,
    grid: &CalendarGrid,
    today: NaiveDate,
) -> String {
    let summaries = summarize_by_category(projects, map);
    let window = map.window();
    let mut output = String::new();

    let _ = writeln!(output, "# Portfolio Activity Report");
    let _ = writeln!(
        output,
        "Activity (past 365 days) from {} through {}",
        window.start, today
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "- {} approved projects", projects.len());
    let _ = writeln!(
        output,
        "- {} activities across {} active days",
        map.total_activities(),
        map.active_days()
    );
    let recent_days = grid.cells().filter(|cell| cell.recent).count();
    let _ = writeln!(output, "- {recent_days} active days in the past week");
    if let Some((day, count)) = busiest_day(map) {
        let _ = writeln!(output, "- busiest day {}", cell_title(day, count));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Categories");

    if summaries.is_empty() {
        let _ = writeln!(output, "No projects available at the moment.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} projects ({} added in the past year)",
                summary.category, summary.count, summary.active_in_window
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Activity");

    let recent: Vec<(&CanonicalDay, &Vec<Activity>)> = map.iter().rev().take(5).collect();
    if recent.is_empty() {
        let _ = writeln!(output, "No activity recorded for this window.");
    } else {
        for (day, activities) in recent {
            let names: Vec<&str> = activities.iter().map(Activity::name).collect();
            let _ = writeln!(output, "- {}: {}", day, names.join(", "));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Calendar");
    let _ = writeln!(output, "```");
    let _ = write!(output, "{}", render_heatmap(grid));
    let _ = writeln!(output, "```");

    output
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CalendarExport<'a> {
    #[serde(flatten)]
    grid: &'a CalendarGrid,
    days: BTreeMap<CanonicalDay, &'a [Activity]>,
}

pub fn render_json(grid: &CalendarGrid, map: &ActivityMap) -> serde_json::Result<String> {
    let export = CalendarExport {
        grid,
        days: map
            .iter()
            .map(|(day, activities)| (*day, activities.as_slice()))
            .collect(),
    };
    serde_json::to_string_pretty(&export)
}
