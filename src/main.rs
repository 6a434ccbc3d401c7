use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

mod classifier;
mod config;
mod db;
mod error;
mod funnel;
mod ingest;
mod insights;
mod models;
mod patterns;
mod report;

use crate::config::Config;
use crate::models::{CommentKind, FunnelSummary};

#[derive(Parser)]
#[command(name = "recruiter-funnel")]
#[command(about = "Conversation funnel analytics for recruiter chat transcripts", long_about = None)]
struct Cli {
    /// Log stage detections and skipped rows
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Upload {
    /// Transcript export (MessageID, CandidateID, Entity, Message, Date[, FullName])
    #[arg(long)]
    csv: PathBuf,
    /// Keep candidates whose name contains "test"
    #[arg(long)]
    include_test_candidates: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print funnel metrics per stage
    Analyze {
        #[command(flatten)]
        upload: Upload,
        /// Emit the full summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print how far each candidate got
    Candidates {
        #[command(flatten)]
        upload: Upload,
        #[arg(long, default_value_t = 25)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        upload: Upload,
        #[arg(long, default_value = "funnel-report.md")]
        out: PathBuf,
    },
    /// Create or upgrade the comment store schema
    InitDb,
    /// Reviewer comments on candidates
    #[command(subcommand)]
    Comment(CommentCommands),
}

#[derive(Subcommand)]
enum CommentCommands {
    /// Attach a comment to a candidate
    Add {
        #[arg(long)]
        candidate: String,
        #[arg(long)]
        author: String,
        #[arg(long, value_enum, default_value_t = CommentKind::Comment)]
        kind: CommentKind,
        #[arg(long)]
        content: String,
    },
    /// List comments, oldest first
    List {
        #[arg(long)]
        candidate: Option<String>,
    },
    /// Mark a comment resolved
    Resolve {
        #[arg(long)]
        id: Uuid,
    },
    /// Delete a comment
    Delete {
        #[arg(long)]
        id: Uuid,
    },
    /// Count comments by kind and status
    Stats,
}

struct Batch {
    summary: FunnelSummary,
    filtered_out: Vec<String>,
}

fn run_batch(upload: &Upload) -> anyhow::Result<Batch> {
    let loaded = ingest::load_conversations(&upload.csv)
        .with_context(|| format!("failed to read {}", upload.csv.display()))?;

    let (conversations, filtered_out) = if upload.include_test_candidates {
        (loaded.conversations, Vec::new())
    } else {
        ingest::filter_test_candidates(loaded.conversations)
    };
    let total_messages = conversations.iter().map(|c| c.messages.len()).sum();

    let results = conversations.iter().map(classifier::classify).collect();
    let summary = funnel::summarize(results, total_messages);
    info!(
        rows = loaded.total_rows,
        skipped = loaded.error_rows,
        candidates = summary.total_candidates,
        "batch analysed"
    );

    Ok(Batch {
        summary,
        filtered_out,
    })
}

fn source_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(EnvFilter::new(config.log_filter(cli.verbose)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Analyze { upload, json } => {
            let batch = run_batch(&upload)?;
            let summary = &batch.summary;

            if json {
                println!("{}", serde_json::to_string_pretty(summary)?);
                return Ok(());
            }

            if summary.total_candidates == 0 {
                println!("No conversations found in {}.", upload.csv.display());
                return Ok(());
            }

            println!(
                "{} candidates, {} decisions ({:.1}%), avg time to decision {}",
                summary.total_candidates,
                summary.decisions,
                summary.overall_conversion_rate,
                report::format_duration(summary.avg_time_to_decision_ms)
            );
            let status = &summary.status_distribution;
            println!(
                "PASS {}, FAIL {}, NO_RESP {} (approval {:.1}%, response {:.1}%)",
                status.approved,
                status.rejected,
                status.no_response,
                summary.approval_rate,
                summary.response_rate
            );
            for (index, stage) in summary.stages.iter().enumerate() {
                let (lost, _) = funnel::stage_drop_off(&summary.stages, index);
                println!(
                    "- {:<24} entered {:>4}  completed {:>4} ({:>5.1}%)  dropped {:>4}  lost {:>4}  avg {}",
                    stage.stage_name,
                    stage.candidates_entered,
                    stage.candidates_completed,
                    stage.conversion_rate,
                    stage.candidates_dropped,
                    lost,
                    report::format_duration(stage.avg_time_in_stage_ms)
                );
                for question in stage.sub_stages.iter() {
                    println!(
                        "    {:<20} entered {:>4}  completed {:>4} ({:>5.1}%)  avg {}",
                        question.stage_name,
                        question.candidates_entered,
                        question.candidates_completed,
                        question.conversion_rate,
                        report::format_duration(question.avg_time_in_stage_ms)
                    );
                }
            }
            for insight in summary.insights.iter() {
                println!("* {}: {}", insight.title, insight.description);
            }
        }
        Commands::Candidates { upload, limit } => {
            let batch = run_batch(&upload)?;

            if batch.summary.candidates.is_empty() {
                println!("No conversations found in {}.", upload.csv.display());
                return Ok(());
            }

            for candidate in batch.summary.candidates.iter().take(limit) {
                let outcome = match (candidate.decision_made, candidate.dropped_at) {
                    (true, _) => "interview scheduled".to_string(),
                    (false, Some(stage)) => format!("dropped at {}", stage.display_name()),
                    (false, None) => "no recruiter messages".to_string(),
                };
                println!(
                    "- {} ({}) [{}]: {} stages, last {}, {} over {}",
                    candidate.candidate_name,
                    candidate.candidate_id,
                    candidate.status.as_str(),
                    candidate.stages.len(),
                    candidate.current_stage.as_deref().unwrap_or("none"),
                    outcome,
                    report::format_duration(candidate.total_duration_ms as f64)
                );
            }
        }
        Commands::Report { upload, out } => {
            let batch = run_batch(&upload)?;
            let output =
                report::build_report(&source_label(&upload.csv), &batch.summary, &batch.filtered_out);
            std::fs::write(&out, output)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::InitDb => {
            let pool = db::connect(config.database_url()?).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Comment(command) => {
            let pool = db::connect(config.database_url()?).await?;
            run_comment_command(&pool, command).await?;
        }
    }

    Ok(())
}

async fn run_comment_command(pool: &sqlx::PgPool, command: CommentCommands) -> anyhow::Result<()> {
    match command {
        CommentCommands::Add {
            candidate,
            author,
            kind,
            content,
        } => {
            let comment = db::add_comment(pool, &candidate, &author, kind, &content).await?;
            println!("Added {} {} for candidate {}.", comment.kind.as_str(), comment.id, candidate);
        }
        CommentCommands::List { candidate } => {
            let comments = db::fetch_comments(pool, candidate.as_deref()).await?;
            if comments.is_empty() {
                println!("No comments found.");
                return Ok(());
            }
            for comment in comments.iter() {
                println!(
                    "- [{}] {} {} on {} by {}{}: {}",
                    comment.created_at.format("%Y-%m-%d %H:%M"),
                    comment.kind.as_str(),
                    comment.id,
                    comment.candidate_id,
                    comment.author,
                    if comment.resolved { " (resolved)" } else { "" },
                    comment.content
                );
            }
        }
        CommentCommands::Resolve { id } => {
            if db::resolve_comment(pool, id).await? {
                println!("Comment {id} resolved.");
            } else {
                println!("No comment with id {id}.");
            }
        }
        CommentCommands::Delete { id } => {
            if db::delete_comment(pool, id).await? {
                println!("Comment {id} deleted.");
            } else {
                println!("No comment with id {id}.");
            }
        }
        CommentCommands::Stats => {
            let comments = db::fetch_comments(pool, None).await?;
            let stats = report::summarize_comments(&comments);
            println!(
                "{} comments ({} open, {} resolved): {} comments, {} annotations, {} decisions",
                stats.total,
                stats.open,
                stats.resolved,
                stats.comments,
                stats.annotations,
                stats.decisions
            );
        }
    }

    Ok(())
}
