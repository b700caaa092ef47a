//! Roadmap: feature suggestions, comments and votes over SQLite.
//!
//! # Architecture
//!
//! ## One store, one broker
//!
//! All state lives in a single store directory (`.roadmap/` by default):
//! - `roadmap.db`: features, comments and votes
//! - `roadmap.events.jsonl`: one audit event per store operation
//! - `roadmap.toml`: optional configuration (admins, permission mode, limits)
//!
//! Every read and write goes through `DbBroker`, which opens a fresh
//! connection per call and records the audit event. Writes run in IMMEDIATE
//! transactions; there is no in-process locking.
//!
//! ## The vote ledger
//!
//! `services::votes::VoteLedger` keeps `features.votes` equal to the number
//! of vote rows for each feature, and at most one vote per (feature, voter).
//! See its module docs for the transaction shape.
//!
//! ## Surfaces
//!
//! - `app::RoadmapApp`: every operation with identity/permission checks
//! - `api`: method + path router implementing the HTTP contract
//! - the `roadmap` CLI, including `roadmap serve` (JSON lines on stdin/stdout)
//!
//! # Examples
//!
//! ```bash
//! roadmap init
//! roadmap --as user:default/alice feature add "Dark mode" --description "Please"
//! roadmap --as user:default/alice vote toggle --feature 1
//! roadmap vote counts --ids 1,2,3
//! echo '{"method":"GET","path":"/votes/1/count"}' | roadmap serve
//! ```

pub mod api;
pub mod app;
pub mod core;
pub mod services;

use crate::app::RoadmapApp;
use crate::core::{broker, error, output, store, time};
use crate::services::comments::NewComment;
use crate::services::features::{FeatureId, FeatureStatus, NewFeature, parse_feature_ids};
use crate::services::permissions::Permission;

use clap::{Parser, Subcommand, ValueEnum};
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[clap(
    name = "roadmap",
    version = env!("CARGO_PKG_VERSION"),
    about = "Roadmap features, comments and votes"
)]
struct Cli {
    /// Store directory (defaults to the nearest `.roadmap`, or `./.roadmap`).
    #[clap(long, global = true, env = "ROADMAP_ROOT")]
    root: Option<PathBuf>,
    /// Acting user reference (e.g. `user:default/alice`).
    #[clap(long = "as", global = true, env = "ROADMAP_USER")]
    user: Option<String>,
    /// Output format.
    #[clap(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the store directory and database.
    Init,
    /// Roadmap items.
    Feature(FeatureCli),
    /// Feature discussion.
    Comment(CommentCli),
    /// Voting.
    Vote(VoteCli),
    /// Report whether the acting user is a roadmap admin.
    CheckAdmin,
    /// List the permissions this roadmap defines.
    Permissions,
    /// Answer API requests read as JSON lines from stdin.
    Serve,
    /// Print the audit log.
    Audit {
        /// Show only the most recent N events.
        #[clap(long)]
        limit: Option<usize>,
    },
}

#[derive(clap::Args, Debug)]
struct FeatureCli {
    #[clap(subcommand)]
    command: FeatureCommand,
}

#[derive(Subcommand, Debug)]
enum FeatureCommand {
    /// Suggest a new feature.
    Add {
        #[clap(value_name = "TITLE")]
        title: String,
        #[clap(long)]
        description: String,
    },
    /// List all features.
    List,
    /// Show one feature.
    Get {
        #[clap(long)]
        id: FeatureId,
    },
    /// Change a feature's status (admin).
    Status {
        #[clap(long)]
        id: FeatureId,
        #[clap(long)]
        status: FeatureStatus,
    },
    /// Delete a feature with its comments and votes (admin).
    Delete {
        #[clap(long)]
        id: FeatureId,
    },
    /// Show features grouped by status.
    Board,
}

#[derive(clap::Args, Debug)]
struct CommentCli {
    #[clap(subcommand)]
    command: CommentCommand,
}

#[derive(Subcommand, Debug)]
enum CommentCommand {
    /// Comment on a feature.
    Add {
        #[clap(long)]
        feature: FeatureId,
        #[clap(long)]
        text: String,
    },
    /// List comments on a feature.
    List {
        #[clap(long)]
        feature: FeatureId,
    },
}

#[derive(clap::Args, Debug)]
struct VoteCli {
    #[clap(subcommand)]
    command: VoteCommand,
}

#[derive(Subcommand, Debug)]
enum VoteCommand {
    /// Add the acting user's vote, or remove it if already present.
    Toggle {
        #[clap(long)]
        feature: FeatureId,
    },
    /// Vote count for one feature.
    Count {
        #[clap(long)]
        feature: FeatureId,
    },
    /// Vote counts for a comma separated list of features.
    Counts {
        #[clap(long, default_value = "")]
        ids: String,
    },
    /// Whether the acting user has voted on a feature.
    Has {
        #[clap(long)]
        feature: FeatureId,
    },
    /// Compare every counter with its vote rows.
    Audit,
}

fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf, error::RoadmapError> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    let current_dir = std::env::current_dir()?;
    Ok(store::find_store_root(&current_dir).unwrap_or_else(|| current_dir.join(".roadmap")))
}

fn emit(format: OutputFormat, cmd: &str, payload: serde_json::Value, text: impl FnOnce() -> String) {
    match format {
        OutputFormat::Json => {
            let envelope = time::command_envelope(cmd, "ok", serde_json::json!({ "result": payload }));
            println!("{}", envelope);
        }
        OutputFormat::Text => println!("{}", text()),
    }
}

pub fn run() -> Result<(), error::RoadmapError> {
    let cli = Cli::parse();
    let root = resolve_root(cli.root)?;
    let user = cli.user.as_deref();
    let format = cli.format;

    if let Command::Audit { limit } = cli.command {
        return print_audit(&store::Store::new(&root).events_path(), limit, format);
    }

    let app = RoadmapApp::open(&root, None)?;

    match cli.command {
        Command::Init => {
            use colored::Colorize;
            emit(
                format,
                "init",
                serde_json::json!({ "root": root.to_string_lossy() }),
                || format!("{} roadmap store ready at {}", "✓".green().bold(), root.display()),
            );
        }
        Command::Feature(feature_cli) => run_feature_cli(&app, user, format, feature_cli)?,
        Command::Comment(comment_cli) => run_comment_cli(&app, user, format, comment_cli)?,
        Command::Vote(vote_cli) => run_vote_cli(&app, user, format, vote_cli)?,
        Command::CheckAdmin => {
            let is_admin = app.check_admin(user)?;
            emit(format, "check-admin", serde_json::json!(is_admin), || {
                is_admin.to_string()
            });
        }
        Command::Permissions => {
            let listed: Vec<serde_json::Value> = Permission::ALL
                .iter()
                .map(|p| serde_json::json!({ "name": p.name(), "action": p.action() }))
                .collect();
            emit(format, "permissions", serde_json::json!(listed), || {
                Permission::ALL
                    .iter()
                    .map(|p| format!("{}\t{}", p.name(), p.action()))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        Command::Serve => serve(&app)?,
        Command::Audit { .. } => {}
    }
    Ok(())
}

fn run_feature_cli(
    app: &RoadmapApp,
    user: Option<&str>,
    format: OutputFormat,
    cli: FeatureCli,
) -> Result<(), error::RoadmapError> {
    use colored::Colorize;
    match cli.command {
        FeatureCommand::Add { title, description } => {
            let feature = app.suggest_feature(user, &NewFeature { title, description })?;
            emit(format, "feature.add", serde_json::to_value(&feature)?, || {
                format!("{} #{} {}", "Suggested".cyan(), feature.id, feature.title)
            });
        }
        FeatureCommand::List => {
            let features = app.features()?;
            emit(format, "feature.list", serde_json::to_value(&features)?, || {
                features
                    .iter()
                    .map(|f| {
                        format!(
                            "#{:<5} {:<10} {:>4} votes  {}",
                            f.id,
                            f.status.to_string(),
                            f.votes,
                            output::compact_line(&f.title, 60)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        FeatureCommand::Get { id } => {
            let feature = app.feature(id)?;
            emit(format, "feature.get", serde_json::to_value(&feature)?, || {
                format!(
                    "#{} {} [{}] {} votes\nby {}\n\n{}",
                    feature.id,
                    feature.title.bold(),
                    feature.status,
                    feature.votes,
                    feature.author,
                    feature.description
                )
            });
        }
        FeatureCommand::Status { id, status } => {
            let feature = app.set_feature_status(user, id, status)?;
            emit(format, "feature.status", serde_json::to_value(&feature)?, || {
                format!("#{} is now {}", feature.id, feature.status.label().bold())
            });
        }
        FeatureCommand::Delete { id } => {
            app.delete_feature(user, id)?;
            emit(format, "feature.delete", serde_json::json!({ "id": id }), || {
                format!("#{} deleted", id)
            });
        }
        FeatureCommand::Board => {
            let columns = app.board()?;
            emit(format, "feature.board", serde_json::to_value(&columns)?, || {
                let mut out = String::new();
                for column in &columns {
                    out.push_str(&format!(
                        "{} ({})\n",
                        column.title.bold().underline(),
                        column.features.len()
                    ));
                    for f in &column.features {
                        out.push_str(&format!(
                            "  {:>4}  #{} {}\n",
                            f.votes,
                            f.id,
                            output::compact_line(&f.title, 60)
                        ));
                    }
                }
                out.trim_end().to_string()
            });
        }
    }
    Ok(())
}

fn run_comment_cli(
    app: &RoadmapApp,
    user: Option<&str>,
    format: OutputFormat,
    cli: CommentCli,
) -> Result<(), error::RoadmapError> {
    match cli.command {
        CommentCommand::Add { feature, text } => {
            let comment = app.add_comment(
                user,
                &NewComment {
                    feature_id: feature,
                    text,
                },
            )?;
            emit(format, "comment.add", serde_json::to_value(&comment)?, || {
                format!("comment {} added to #{}", comment.id, comment.feature_id)
            });
        }
        CommentCommand::List { feature } => {
            let comments = app.comments(feature)?;
            emit(format, "comment.list", serde_json::to_value(&comments)?, || {
                comments
                    .iter()
                    .map(|c| format!("[{}] {}: {}", c.created_at, c.author, output::compact_line(&c.text, 120)))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
    }
    Ok(())
}

fn run_vote_cli(
    app: &RoadmapApp,
    user: Option<&str>,
    format: OutputFormat,
    cli: VoteCli,
) -> Result<(), error::RoadmapError> {
    match cli.command {
        VoteCommand::Toggle { feature } => {
            let toggle = app.toggle_vote(user, feature)?;
            emit(format, "vote.toggle", serde_json::to_value(toggle)?, || {
                format!(
                    "{} on #{} ({} votes)",
                    if toggle.vote_added { "Vote added" } else { "Vote removed" },
                    feature,
                    toggle.vote_count
                )
            });
        }
        VoteCommand::Count { feature } => {
            let count = app.vote_count(feature)?;
            emit(format, "vote.count", serde_json::json!(count), || count.to_string());
        }
        VoteCommand::Counts { ids } => {
            let ids = parse_feature_ids(&ids)?;
            let counts = app.vote_counts(&ids)?;
            let keyed: serde_json::Map<String, serde_json::Value> = counts
                .iter()
                .map(|(id, count)| (id.to_string(), serde_json::json!(count)))
                .collect();
            emit(format, "vote.counts", serde_json::Value::Object(keyed), || {
                counts
                    .iter()
                    .map(|(id, count)| format!("#{}\t{}", id, count))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        VoteCommand::Has { feature } => {
            let voted = app.has_voted(user, feature)?;
            emit(format, "vote.has", serde_json::json!(voted), || voted.to_string());
        }
        VoteCommand::Audit => {
            let drift = app.ledger().audit_counters()?;
            let rows: Vec<serde_json::Value> = drift
                .iter()
                .map(|(id, counter, rows)| serde_json::json!({ "id": id, "counter": counter, "rows": rows }))
                .collect();
            emit(format, "vote.audit", serde_json::json!(rows), || {
                if drift.is_empty() {
                    "all vote counters match their vote rows".to_string()
                } else {
                    drift
                        .iter()
                        .map(|(id, counter, rows)| format!("#{}: counter {} != {} rows", id, counter, rows))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            });
            if !drift.is_empty() {
                return Err(error::RoadmapError::ConfigError(format!(
                    "{} feature(s) with drifted vote counters",
                    drift.len()
                )));
            }
        }
    }
    Ok(())
}

/// Reads one JSON request per line and writes one JSON response per line.
/// Malformed lines get a 400 response; the loop ends at EOF.
pub fn serve(app: &RoadmapApp) -> Result<(), error::RoadmapError> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve_lines(app, stdin.lock(), &mut stdout.lock())
}

pub fn serve_lines<R: BufRead, W: Write>(
    app: &RoadmapApp,
    input: R,
    output: &mut W,
) -> Result<(), error::RoadmapError> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<api::ApiRequest>(&line) {
            Ok(req) => api::handle(app, &req),
            Err(e) => {
                let err = error::RoadmapError::InputError(format!("malformed request: {}", e));
                api::ApiResponse {
                    id: "unknown".to_string(),
                    status: err.status_code(),
                    body: api::error_body(&err),
                }
            }
        };
        writeln!(output, "{}", serde_json::to_string(&response)?)?;
        output.flush()?;
    }
    Ok(())
}

fn print_audit(
    events_path: &std::path::Path,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<(), error::RoadmapError> {
    let events = broker::read_events(events_path)?;
    let skip = limit.map(|n| events.len().saturating_sub(n)).unwrap_or(0);
    let shown = &events[skip..];
    emit(format, "audit", serde_json::to_value(shown)?, || {
        shown
            .iter()
            .map(|e| format!("{} {:<8} {:<24} {:<24} {}", e.ts, e.status, e.op, e.actor, e.event_id))
            .collect::<Vec<_>>()
            .join("\n")
    });
    Ok(())
}
