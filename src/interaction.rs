use std::fmt::{self, Write};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::activity::ActivityMap;
use crate::calendar::CalendarGrid;
use crate::models::{Activity, CanonicalDay, Project};

const UNTITLED: &str = "(untitled)";

#[derive(Debug, Clone, Serialize)]
pub struct DayActivated {
    pub date: CanonicalDay,
    pub projects: Vec<Activity>,
}

pub fn cell_title(day: CanonicalDay, count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("{day}: {count} project{plural}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooltip {
    pub title: String,
    pub items: Vec<String>,
}

impl Tooltip {
    pub fn new(day: CanonicalDay, activities: &[Activity]) -> Self {
        Self {
            title: day.to_string(),
            items: activities
                .iter()
                .map(|activity| display_name(activity.name()).to_string())
                .collect(),
        }
    }
}

impl fmt::Display for Tooltip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        if self.items.is_empty() {
            return write!(f, "No projects");
        }
        let mut items = self.items.iter().peekable();
        while let Some(item) = items.next() {
            write!(f, "  - {item}")?;
            if items.peek().is_some() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

fn display_name(name: &str) -> &str {
    if name.trim().is_empty() {
        UNTITLED
    } else {
        name
    }
}

#[derive(Debug, Clone)]
pub struct ActivityBus {
    sender: broadcast::Sender<DayActivated>,
}

impl ActivityBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DayActivated> {
        self.sender.subscribe()
    }

    /// Emits the day's activities. Padding cells and days outside the grid
    /// are not interactive.
    pub fn activate(
        &self,
        grid: &CalendarGrid,
        map: &ActivityMap,
        day: CanonicalDay,
    ) -> Option<DayActivated> {
        grid.cell(day)?;
        let event = DayActivated {
            date: day,
            projects: map.day(day).to_vec(),
        };
        if self.sender.send(event.clone()).is_err() {
            debug!(%day, "day activated with no listeners");
        }
        Some(event)
    }
}

impl Default for ActivityBus {
    fn default() -> Self {
        Self::new(16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Normal,
    Highlighted,
    Dimmed,
}

#[derive(Debug, Clone)]
pub struct CardView<'a> {
    pub project: &'a Project,
    pub emphasis: Emphasis,
}

#[derive(Debug, Default, Clone)]
pub struct Selection {
    selected: Option<CanonicalDay>,
}

impl Selection {
    pub fn selected(&self) -> Option<CanonicalDay> {
        self.selected
    }

    /// Selecting the selected day again clears the selection.
    pub fn toggle(&mut self, day: CanonicalDay) -> Option<CanonicalDay> {
        self.selected = match self.selected {
            Some(current) if current == day => None,
            _ => Some(day),
        };
        self.selected
    }

    pub fn highlight<'a>(&self, projects: &'a [Arc<Project>]) -> Vec<CardView<'a>> {
        projects
            .iter()
            .map(|project| {
                let emphasis = match self.selected {
                    None => Emphasis::Normal,
                    Some(day) if project.date() == Some(day) => Emphasis::Highlighted,
                    Some(_) => Emphasis::Dimmed,
                };
                CardView {
                    project: project.as_ref(),
                    emphasis,
                }
            })
            .collect()
    }
}

pub fn modal_text(event: &DayActivated) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# {}", event.date);

    if event.projects.is_empty() {
        let _ = writeln!(output, "No projects for this date.");
        return output;
    }

    for activity in &event.projects {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", display_name(activity.name()));
        match activity {
            Activity::Project(project) => {
                let mut meta = project.category.clone();
                if let Some(status) = &project.status {
                    if !meta.is_empty() {
                        meta.push(' ');
                    }
                    let _ = write!(meta, "[{status}]");
                }
                if !meta.is_empty() {
                    let _ = writeln!(output, "{meta}");
                }
                if !project.description.is_empty() {
                    let _ = writeln!(output, "{}", project.description);
                }
                if let Some(link) = &project.link {
                    let _ = writeln!(output, "View project: {link}");
                }
            }
            Activity::Marker { .. } => {
                let _ = writeln!(output, "Advancement logged for a project not in the list.");
            }
        }
    }

    output
}
