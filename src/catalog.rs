use std::fmt::Write;
use std::sync::Arc;

use crate::interaction::{CardView, Emphasis};
use crate::models::Project;

pub const ALL_CATEGORIES: &str = "All";

pub fn filter_by_category(projects: &[Arc<Project>], category: &str) -> Vec<Arc<Project>> {
    let category = category.trim();
    if category.is_empty() || category == ALL_CATEGORIES {
        return projects.to_vec();
    }
    projects
        .iter()
        .filter(|project| project.category == category)
        .cloned()
        .collect()
}

/// Case-insensitive match on name, description, category and tech stack.
pub fn search(projects: &[Arc<Project>], query: &str) -> Vec<Arc<Project>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return projects.to_vec();
    }
    projects
        .iter()
        .filter(|project| {
            [&project.name, &project.description, &project.category]
                .into_iter()
                .chain(project.tech_stack.iter())
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

pub fn categories(projects: &[Arc<Project>]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for project in projects {
        if !project.category.is_empty() && !seen.contains(&project.category) {
            seen.push(project.category.clone());
        }
    }
    seen
}

pub fn card(project: &Project) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", project.name);
    if !project.description.is_empty() {
        let _ = writeln!(output, "  {}", project.description);
    }

    let mut meta = Vec::new();
    if !project.category.is_empty() {
        meta.push(format!("[{}]", project.category));
    }
    if let Some(day) = project.date() {
        meta.push(format!("added {day}"));
    }
    if !project.tech_stack.is_empty() {
        meta.push(project.tech_stack.join(", "));
    }
    if !meta.is_empty() {
        let _ = writeln!(output, "  {}", meta.join(" | "));
    }
    if let Some(link) = &project.link {
        let _ = writeln!(output, "  {link}");
    }
    output
}

pub fn render_cards(cards: &[CardView<'_>]) -> String {
    if cards.is_empty() {
        return "No projects available at the moment.\n".to_string();
    }

    let mut output = String::new();
    for view in cards {
        let marker = match view.emphasis {
            Emphasis::Normal => "",
            Emphasis::Highlighted => "* ",
            Emphasis::Dimmed => "  ",
        };
        for (index, line) in card(view.project).lines().enumerate() {
            if index == 0 {
                let _ = writeln!(output, "{marker}{line}");
            } else if view.emphasis == Emphasis::Dimmed {
                continue;
            } else {
                let _ = writeln!(output, "{}{line}", " ".repeat(marker.len()));
            }
        }
        let _ = writeln!(output);
    }
    output
}
