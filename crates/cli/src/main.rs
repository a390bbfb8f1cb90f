//! SkillMatrix CLI - skill ratings, approvals and personal goals.

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use skillmatrix_core::{
    CategoryId, GoalId, NotificationId, RatingId, RatingLevel, RatingStatus, SkillCatalog, SkillId,
    SubskillId, UserId,
};
use skillmatrix_progress::CategoryProgressSummary;
use skillmatrix_storage::{JsonStorage, Storage};
use skillmatrix_work::{GoalSpec, RatingWorkflow, ServiceConfig, SkillService};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skillmatrix")]
#[command(about = "Skill ratings, approvals and personal goals", long_about = None)]
struct Cli {
    /// Data directory
    #[arg(long, env = "SKILLMATRIX_DATA_DIR", default_value = ".skillmatrix", global = true)]
    data_dir: PathBuf,

    /// Acting user
    #[arg(long, env = "SKILLMATRIX_USER", default_value = "me", global = true)]
    user: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the skill catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),
    /// Create, submit and review ratings
    #[command(subcommand)]
    Rating(RatingCommand),
    /// Manage personal goals
    #[command(subcommand)]
    Goal(GoalCommand),
    /// Show progress of one category
    Category {
        /// Category ID
        id: String,
    },
    /// Read notifications
    #[command(subcommand)]
    Notifications(NotificationCommand),
    /// Show XP, level and streaks
    Profile,
}

#[derive(Subcommand)]
enum CatalogCommand {
    /// Replace the catalog with a JSON file
    Import {
        /// Path to the catalog file
        path: PathBuf,
    },
    /// Print categories, skills and subskills
    Show,
}

#[derive(Subcommand)]
enum RatingCommand {
    /// Start a draft rating
    Create {
        /// Skill ID
        skill: String,
        /// Subskill ID
        #[arg(long)]
        subskill: Option<String>,
        /// Level (low, medium, high)
        level: RatingLevel,
    },
    /// Submit a draft for approval
    Submit {
        /// Rating ID
        id: RatingId,
        /// Evidence for the rating
        comment: String,
    },
    /// Approve a submitted rating
    Approve {
        /// Rating ID
        id: RatingId,
        /// Review comment
        comment: String,
    },
    /// Reject a submitted rating
    Reject {
        /// Rating ID
        id: RatingId,
        /// Review comment
        comment: String,
    },
    /// List your ratings
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// List ratings waiting for your review
    Pending,
}

#[derive(Subcommand)]
enum GoalCommand {
    /// Set a goal
    Create {
        /// Skill ID
        skill: String,
        /// Subskill ID
        #[arg(long)]
        subskill: Option<String>,
        /// Target level
        target: RatingLevel,
        /// Starting level, defaults to the approved rating
        #[arg(long)]
        current: Option<RatingLevel>,
        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        due: NaiveDate,
    },
    /// List your goals
    List,
    /// Recompute progress and flag overdue goals
    Refresh,
    /// Cancel a goal
    Cancel {
        /// Goal ID
        id: GoalId,
    },
    /// Show the progress history of a goal
    History {
        /// Goal ID
        id: GoalId,
    },
}

#[derive(Subcommand)]
enum NotificationCommand {
    /// List notifications, newest first
    List {
        /// Only unread ones
        #[arg(long)]
        unread: bool,
    },
    /// Mark a notification as read
    Read {
        /// Notification ID
        id: NotificationId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let storage = JsonStorage::new(&cli.data_dir)
        .await
        .with_context(|| format!("opening data directory {}", cli.data_dir.display()))?;
    let config = load_config(&cli.data_dir).await?;
    let service = SkillService::new(storage).with_config(config);
    let user = UserId::new(cli.user);
    let today = Utc::now().date_naive();

    match cli.command {
        Commands::Catalog(CatalogCommand::Import { path }) => {
            let body = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let catalog: SkillCatalog = serde_json::from_str(&body)
                .with_context(|| format!("parsing {}", path.display()))?;
            service.storage().lock().await.save_catalog(&catalog).await?;
            info!(
                "Imported {} categories, {} skills, {} subskills",
                catalog.categories.len(),
                catalog.skills.len(),
                catalog.subskills.len()
            );
        }
        Commands::Catalog(CatalogCommand::Show) => {
            let catalog = service.storage().lock().await.load_catalog().await?;
            for category in &catalog.categories {
                println!("{} - {}", category.id, category.name);
                for skill in catalog.skills_in(&category.id) {
                    println!("  {} - {}", skill.id, skill.name);
                    for sub in catalog.subskills_of(&skill.id) {
                        println!("    {} - {}", sub.id, sub.name);
                    }
                }
            }
        }

        Commands::Rating(RatingCommand::Create { skill, subskill, level }) => {
            let rating = service
                .create_rating(&user, SkillId::new(skill), subskill.map(SubskillId::new), level)
                .await?;
            println!("Created draft rating: {}", rating.id);
        }
        Commands::Rating(RatingCommand::Submit { id, comment }) => {
            let rating = service.submit_rating(id, &user, &comment).await?;
            println!("Submitted rating {} ({})", rating.id, rating.level);
        }
        Commands::Rating(RatingCommand::Approve { id, comment }) => {
            let changes = service.approve_rating(id, &user, &comment).await?;
            println!("Approved rating {}", id);
            for goal in &changes.goals {
                println!("  Goal {} now {}% ({})", goal.id, goal.progress_percentage, goal.status);
            }
        }
        Commands::Rating(RatingCommand::Reject { id, comment }) => {
            service.reject_rating(id, &user, &comment).await?;
            println!("Rejected rating {}", id);
        }
        Commands::Rating(RatingCommand::List { status }) => {
            let status = status.map(|s| parse_status(&s)).transpose()?;
            let ratings: Vec<_> = service
                .load(&user)
                .await?
                .ratings_sorted()
                .into_iter()
                .filter(|r| status.map_or(true, |s| r.status == s))
                .collect();

            println!("Ratings ({})", ratings.len());
            for r in ratings {
                println!(
                    "  {} | {} | {} | {}",
                    r.id,
                    format_status(r.status),
                    r.level,
                    unit(&r.skill_id, r.subskill_id.as_ref())
                );
            }
        }
        Commands::Rating(RatingCommand::Pending) => {
            let pending = service.pending_approvals(&user).await?;
            println!("Awaiting review ({})", pending.len());
            for r in pending {
                println!(
                    "  {} | {} | {} | {} - {}",
                    r.id,
                    r.owner_id,
                    r.level,
                    unit(&r.skill_id, r.subskill_id.as_ref()),
                    r.self_comment
                );
            }
        }

        Commands::Goal(GoalCommand::Create { skill, subskill, target, current, due }) => {
            let spec = GoalSpec {
                skill_id: SkillId::new(skill),
                subskill_id: subskill.map(SubskillId::new),
                target_rating: target,
                current_rating: current,
                target_date: due,
            };
            let changes = service.create_goal(&user, spec, today).await?;
            for goal in &changes.goals {
                println!("Created goal: {} ({}%)", goal.id, goal.progress_percentage);
            }
        }
        Commands::Goal(GoalCommand::List) => {
            let goals = service.load(&user).await?.goals_sorted();
            println!("Goals ({})", goals.len());
            for g in goals {
                println!(
                    "  {} | {} | {}% | {} -> {} by {} | {}",
                    g.id,
                    g.status.as_str().to_uppercase(),
                    g.progress_percentage,
                    g.current_rating,
                    g.target_rating,
                    g.target_date,
                    unit(&g.skill_id, g.subskill_id.as_ref())
                );
            }
        }
        Commands::Goal(GoalCommand::Refresh) => {
            let changes = service.refresh_goal_progress(&user, today).await?;
            println!("Updated {} goals", changes.goals.len());
        }
        Commands::Goal(GoalCommand::Cancel { id }) => {
            let goal = service.cancel_goal(id, &user).await?;
            println!("Cancelled goal {}", goal.id);
        }
        Commands::Goal(GoalCommand::History { id }) => {
            let history = service.goal_history(id).await?;
            println!("History of goal {} ({})", id, history.len());
            for h in history {
                println!(
                    "  {} | {} -> {} | {}%{}",
                    h.recorded_at.format("%Y-%m-%d %H:%M"),
                    h.previous_rating,
                    h.new_rating,
                    h.progress_percentage,
                    h.milestone.map(|m| format!(" | {}", m.as_str())).unwrap_or_default()
                );
            }
        }

        Commands::Category { id } => {
            let summary = service.aggregate_category(&user, &CategoryId::new(id)).await?;
            print_summary(&summary)?;
        }

        Commands::Notifications(NotificationCommand::List { unread }) => {
            let notes = service.notifications(&user, unread).await?;
            println!("Notifications ({})", notes.len());
            for n in notes {
                println!(
                    "  {} {} | {} | {} - {}",
                    if n.read { " " } else { "*" },
                    n.id,
                    n.kind.as_str(),
                    n.title,
                    n.message
                );
            }
        }
        Commands::Notifications(NotificationCommand::Read { id }) => {
            service.mark_notification_read(id, &user).await?;
            println!("Marked {} as read", id);
        }

        Commands::Profile => {
            let profile = service.gamification_profile(&user).await?;
            println!("Profile: {}", profile.owner_id);
            println!("  Level: {}", profile.level);
            println!("  XP: {}", profile.total_xp);
            println!("  Goals set: {}", profile.goals_set_count);
            println!("  Goals achieved: {}", profile.goals_achieved_count);
            println!("  Streak: {} (best {})", profile.current_streak, profile.best_streak);
        }
    }

    Ok(())
}

/// Read `config.json` from the data directory, falling back to defaults.
async fn load_config(data_dir: &Path) -> Result<ServiceConfig> {
    let path = data_dir.join("config.json");
    if !tokio::fs::try_exists(&path).await? {
        return Ok(ServiceConfig::default());
    }
    let body = tokio::fs::read_to_string(&path).await?;
    let config = serde_json::from_str(&body).with_context(|| format!("parsing {}", path.display()))?;
    debug!("Loaded config from {}: {:?}", path.display(), config);
    Ok(config)
}

fn print_summary(summary: &CategoryProgressSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

fn unit(skill: &SkillId, subskill: Option<&SubskillId>) -> String {
    match subskill {
        Some(sub) => format!("{}/{}", skill, sub),
        None => skill.to_string(),
    }
}

fn parse_status(s: &str) -> Result<RatingStatus> {
    match s.to_lowercase().as_str() {
        "draft" => Ok(RatingStatus::Draft),
        "submitted" => Ok(RatingStatus::Submitted),
        "approved" => Ok(RatingStatus::Approved),
        "rejected" => Ok(RatingStatus::Rejected),
        other => anyhow::bail!("unknown rating status '{}'", other),
    }
}

fn format_status(status: RatingStatus) -> &'static str {
    match status {
        RatingStatus::Draft => "DRAFT",
        RatingStatus::Submitted => "SUBMITTED",
        RatingStatus::Approved => "APPROVED",
        RatingStatus::Rejected => "REJECTED",
    }
}
