use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod activity;
mod api;
mod calendar;
mod catalog;
mod dates;
mod import;
mod interaction;
mod models;
mod report;
mod session;

use api::{AdvancementData, ApiConfig, NewProject, SheetClient};
use interaction::{ActivityBus, Selection, Tooltip};
use models::{CanonicalDay, Project};
use session::{
    CsvSource, ProjectSource, Refresher, Session, SessionCache, Snapshot, SourceError,
    Visibility, REFRESH_INTERVAL,
};

#[derive(Parser)]
#[command(name = "portfolio-activity")]
#[command(about = "Project list and contribution calendar for a sheet-backed portfolio", long_about = None)]
struct Cli {
    /// Spreadsheet web-app URL
    #[arg(long, env = "PORTFOLIO_API_URL", global = true)]
    api_url: Option<String>,
    /// Read projects from a CSV export instead of the API
    #[arg(long, global = true)]
    projects_csv: Option<PathBuf>,
    /// Advancement rows CSV export, used with --projects-csv
    #[arg(long, global = true, requires = "projects_csv")]
    advancements_csv: Option<PathBuf>,
    #[arg(long, env = "PORTFOLIO_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,
    #[arg(long, default_value_t = 10, global = true)]
    timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List approved projects
    Projects {
        /// Exact category, or "All"
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// Highlight projects added on this day
        #[arg(long)]
        date: Option<CanonicalDay>,
    },
    /// Show the contribution calendar for the past 365 days
    Calendar {
        #[arg(long)]
        today: Option<CanonicalDay>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Open one calendar day
    Day {
        date: CanonicalDay,
        #[arg(long)]
        today: Option<CanonicalDay>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        today: Option<CanonicalDay>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Keep the calendar current; press Enter to pause or resume
    Watch {
        #[arg(long, env = "PORTFOLIO_REFRESH_SECS", default_value_t = REFRESH_INTERVAL.as_secs())]
        interval_secs: u64,
    },
    /// Submit a project for approval
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        link: String,
    },
}

enum DataSource {
    Sheet(SheetClient),
    Csv(CsvSource),
}

impl ProjectSource for DataSource {
    async fn projects(&self) -> Result<Vec<Arc<Project>>, SourceError> {
        match self {
            DataSource::Sheet(client) => client.projects().await,
            DataSource::Csv(files) => files.projects().await,
        }
    }

    async fn advancements(&self) -> Result<AdvancementData, SourceError> {
        match self {
            DataSource::Sheet(client) => client.advancements().await,
            DataSource::Csv(files) => files.advancements().await,
        }
    }
}

fn data_source(cli: &Cli) -> anyhow::Result<DataSource> {
    if let Some(projects) = &cli.projects_csv {
        return Ok(DataSource::Csv(CsvSource {
            projects: projects.clone(),
            advancements: cli.advancements_csv.clone(),
        }));
    }
    let base_url = cli
        .api_url
        .clone()
        .context("PORTFOLIO_API_URL or --api-url must be set (or pass --projects-csv)")?;
    let config = ApiConfig {
        timeout: Duration::from_secs(cli.timeout_secs),
        ..ApiConfig::new(base_url)
    };
    Ok(DataSource::Sheet(SheetClient::new(config)?))
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("portfolio_activity={log_level},warn").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn resolve_today(today: Option<CanonicalDay>) -> NaiveDate {
    today.map(|day| day.date()).unwrap_or_else(activity::today)
}

fn print_calendar(snapshot: &Snapshot) {
    println!("Activity (past 365 days)");
    print!("{}", report::render_heatmap(&snapshot.grid));
    if let Some((day, activities)) = snapshot.activity.iter().next_back() {
        println!("{}", Tooltip::new(*day, activities));
    }
}

fn spawn_visibility_toggle(sender: watch::Sender<Visibility>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            sender.send_modify(|visibility| {
                *visibility = match *visibility {
                    Visibility::Visible => Visibility::Hidden,
                    Visibility::Hidden => Visibility::Visible,
                };
            });
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let source = data_source(&cli)?;

    match cli.command {
        Commands::Projects {
            category,
            search,
            date,
        } => {
            let mut session = Session::new(source, SessionCache::default());
            let projects = session
                .load_projects(true)
                .await
                .context("failed to load projects")?;

            let categories = catalog::categories(&projects);
            println!("Categories: {}, {}", catalog::ALL_CATEGORIES, categories.join(", "));
            println!();

            let mut visible = projects;
            if let Some(category) = category.as_deref() {
                visible = catalog::filter_by_category(&visible, category);
            }
            if let Some(query) = search.as_deref() {
                visible = catalog::search(&visible, query);
            }

            let mut selection = Selection::default();
            if let Some(day) = date {
                selection.toggle(day);
            }
            if let Some(day) = selection.selected() {
                println!("* added on {day}");
                println!();
            }
            print!("{}", catalog::render_cards(&selection.highlight(&visible)));
        }
        Commands::Calendar { today, format } => {
            let today = resolve_today(today);
            let mut session = Session::new(source, SessionCache::default());
            let snapshot = session
                .load_snapshot(true, today)
                .await
                .context("failed to load projects")?;

            match format {
                Format::Text => {
                    print_calendar(&snapshot);
                }
                Format::Markdown => {
                    print!(
                        "{}",
                        report::build_report(
                            &snapshot.projects,
                            &snapshot.activity,
                            &snapshot.grid,
                            today
                        )
                    );
                }
                Format::Json => {
                    println!("{}", report::render_json(&snapshot.grid, &snapshot.activity)?);
                }
            }
        }
        Commands::Day { date, today } => {
            let today = resolve_today(today);
            let mut session = Session::new(source, SessionCache::default());
            let snapshot = session
                .load_snapshot(true, today)
                .await
                .context("failed to load projects")?;

            let bus = ActivityBus::default();
            let mut receiver = bus.subscribe();
            if bus
                .activate(&snapshot.grid, &snapshot.activity, date)
                .is_none()
            {
                bail!("{date} is not within the past 365 days");
            }
            let event = receiver.recv().await?;
            print!("{}", interaction::modal_text(&event));
        }
        Commands::Report { today, out } => {
            let today = resolve_today(today);
            let mut session = Session::new(source, SessionCache::default());
            let snapshot = session
                .load_snapshot(true, today)
                .await
                .context("failed to load projects")?;
            let report = report::build_report(
                &snapshot.projects,
                &snapshot.activity,
                &snapshot.grid,
                today,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Watch { interval_secs } => {
            let period = Duration::from_secs(interval_secs.max(1));
            let mut refresher =
                Refresher::new(Session::new(source, SessionCache::default()), period);

            let initial = refresher
                .refresh(true)
                .await
                .context("failed to load projects")?;
            print_calendar(&initial.snapshot);

            let (sender, receiver) = watch::channel(Visibility::Visible);
            spawn_visibility_toggle(sender);
            info!(?period, "watching for changes");

            tokio::select! {
                _ = refresher.run(receiver, |outcome| {
                    if outcome.removed {
                        warn!("Projects have been updated");
                    }
                    if outcome.changed || outcome.forced {
                        print_calendar(&outcome.snapshot);
                    }
                }) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("stopping");
                }
            }
        }
        Commands::Submit {
            name,
            category,
            description,
            link,
        } => {
            let DataSource::Sheet(client) = source else {
                bail!("submitting requires --api-url, not a CSV export");
            };
            client
                .submit_project(NewProject {
                    name,
                    category,
                    description,
                    link,
                })
                .await?;
            println!("Project submitted successfully! It will be visible after approval.");
        }
    }

    Ok(())
}
