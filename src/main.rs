use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;

use analytics::{AnalyticsFilter, NewSessionResult, ResultsStore, TimePeriod};
use history::{BucketKey, CollapseState};
use hume::{ChatSource, HumeClient};
use poller::{PollUpdate, Poller};
use schedule::{NewSchedule, ScheduleStore};
use types::{ChatGroupSummary, EmotionScore, Outcome};

mod analytics;
mod config;
mod debug_log;
mod emotions;
mod history;
mod hume;
mod mcp;
mod poller;
mod schedule;
mod sports;
mod store;
mod tui;
mod types;
mod utils;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "peakform")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output as JSON (applies to any subcommand that supports --json)
    #[arg(long)]
    json: bool,

    /// Show times in UTC instead of local time
    #[arg(long)]
    utc: bool,

    /// Number of decimal places for emotion scores
    #[arg(long)]
    decimal_places: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show chat history grouped by date (default)
    History(HistoryArgs),
    /// Show one chat's transcript with its top emotions
    Chat(ChatArgs),
    /// Manage scheduled sessions
    Schedule(ScheduleArgs),
    /// Record and list session results
    Results(ResultsArgs),
    /// Summarize results and emotion shifts
    Analytics(AnalyticsArgs),
    /// List supported sports
    Sports,
    /// Fetch a Hume access token using the configured API and secret keys
    Token,
    /// Manage configuration
    Config(ConfigArgs),
    /// Run as an MCP (Model Context Protocol) server
    Mcp,
}

impl Commands {
    /// Carry the top-level `--json` flag into subcommands that print data.
    fn apply_json_flag(&mut self, enabled: bool) {
        if !enabled {
            return;
        }
        match self {
            Commands::History(args) => args.json = true,
            Commands::Chat(args) => args.json = true,
            Commands::Analytics(args) => args.json = true,
            Commands::Schedule(args) => match &mut args.subcommand {
                ScheduleSubcommands::List { json } | ScheduleSubcommands::Active { json } => {
                    *json = true
                }
                ScheduleSubcommands::Add { .. } | ScheduleSubcommands::Remove { .. } => {}
            },
            Commands::Results(args) => {
                if let ResultsSubcommands::List { json } = &mut args.subcommand {
                    *json = true;
                }
            }
            Commands::Sports | Commands::Token | Commands::Config(_) | Commands::Mcp => {}
        }
    }
}

#[derive(Args, Default)]
struct HistoryArgs {
    /// Keep refreshing the history on the configured interval
    #[arg(long, default_value_t = false)]
    watch: bool,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Collapse or expand a section and remember it (today, yesterday, last7days, last30days, YYYY-MM)
    #[arg(long, value_name = "SECTION")]
    toggle: Vec<String>,
}

#[derive(Args)]
struct ChatArgs {
    /// Chat group ID (see `peakform history`)
    group_id: String,

    /// Number of top emotions shown per message
    #[arg(long)]
    top: Option<usize>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args)]
struct ScheduleArgs {
    #[command(subcommand)]
    subcommand: ScheduleSubcommands,
}

#[derive(Subcommand)]
enum ScheduleSubcommands {
    /// Schedule a session
    Add {
        /// Date (YYYY-MM-DD)
        date: String,
        /// Start time (HH:MM)
        time: String,
        #[arg(long)]
        opponent: Option<String>,
        #[arg(long)]
        venue: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List scheduled sessions
    List {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Remove a scheduled session
    Remove { id: String },
    /// Show the session currently in its pre- or post-session window
    Active {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args)]
struct ResultsArgs {
    #[command(subcommand)]
    subcommand: ResultsSubcommands,
}

#[derive(Subcommand)]
enum ResultsSubcommands {
    /// Record the result of a session
    Record(RecordArgs),
    /// List recorded results
    List {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args)]
struct RecordArgs {
    /// win or loss
    #[arg(long)]
    outcome: Outcome,

    /// Sport slug or name. Defaults to the configured sport.
    #[arg(long)]
    sport: Option<String>,

    /// Session date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<String>,

    /// Scheduled session this result belongs to
    #[arg(long)]
    schedule_id: Option<String>,

    /// Performance metric as Name=value (repeatable)
    #[arg(long = "metric", value_name = "NAME=VALUE")]
    metrics: Vec<String>,

    /// Chat group ID of the pre-session check-in
    #[arg(long)]
    pre_chat: Option<String>,

    /// Chat group ID of the post-session check-in
    #[arg(long)]
    post_chat: Option<String>,

    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct AnalyticsArgs {
    /// week, month, season or year. Defaults to all results.
    #[arg(long)]
    period: Option<TimePeriod>,

    /// Only include this sport
    #[arg(long)]
    sport: Option<String>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (api-key, secret-key, hume-url, page-size, refresh-interval, top-emotions, decimal-places, use-utc, sport)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() {
    debug_log::init();

    let mut cli = Cli::parse();
    if let Some(command) = cli.command.as_mut() {
        command.apply_json_flag(cli.json);
    }

    let config = match config::Config::load_effective() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e:#}");
            std::process::exit(1);
        }
    };

    let mut display_options = config.display_options();
    display_options.use_utc |= cli.utc;
    if let Some(places) = cli.decimal_places {
        display_options.decimal_places = places;
    }

    match cli.command {
        None => {
            let args = HistoryArgs {
                json: cli.json,
                ..Default::default()
            };
            if let Err(e) = run_history(&config, args, &display_options).await {
                eprintln!("Error loading chat history: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::History(args)) => {
            if let Err(e) = run_history(&config, args, &display_options).await {
                eprintln!("Error loading chat history: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::Chat(args)) => {
            if let Err(e) = run_chat(&config, args, &display_options).await {
                eprintln!("Error loading chat: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::Schedule(args)) => {
            if let Err(e) = handle_schedule_subcommand(&config, args) {
                eprintln!("Schedule error: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::Results(args)) => {
            if let Err(e) = handle_results_subcommand(&config, args, &display_options).await {
                eprintln!("Results error: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::Analytics(args)) => {
            if let Err(e) = run_analytics(args, &display_options) {
                eprintln!("Analytics error: {e:#}");
                std::process::exit(1);
            }
        }
        Some(Commands::Sports) => {
            print!(
                "{}",
                tui::render_sports(&sports::all_sports(), &config.athlete.sport)
            );
        }
        Some(Commands::Token) => match hume::fetch_access_token(&config).await {
            Ok(token) => println!("{token}"),
            Err(e) => {
                eprintln!("Error fetching access token: {e:#}");
                std::process::exit(1);
            }
        },
        Some(Commands::Config(config_args)) => {
            handle_config_subcommand(config_args).await;
        }
        Some(Commands::Mcp) => {
            if let Err(e) = mcp::run_mcp_server(config).await {
                eprintln!("MCP server error: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

pub fn create_chat_source(config: &config::Config) -> Result<Arc<dyn ChatSource>> {
    Ok(Arc::new(HumeClient::from_config(config)?))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = simd_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// Apply `--toggle` flags to the persisted collapse state.
fn update_collapse_state(config: &config::Config, toggles: &[String]) -> Result<CollapseState> {
    let mut collapse = CollapseState::from_keys(&config.history.collapsed);
    if toggles.is_empty() {
        return Ok(collapse);
    }

    for toggle in toggles {
        let key = BucketKey::from_key(toggle).with_context(|| {
            format!(
                "Unknown section '{toggle}'. Use today, yesterday, last7days, last30days or YYYY-MM"
            )
        })?;
        collapse.toggle(&key);
    }

    // Persist only the collapse state; env-provided keys must not be written to disk.
    let mut stored = config::Config::load()?.unwrap_or_default();
    stored.history.collapsed = collapse.collapsed_keys();
    stored.save(true)?;

    Ok(collapse)
}

async fn run_history(
    config: &config::Config,
    args: HistoryArgs,
    options: &utils::DisplayOptions,
) -> Result<()> {
    let collapse = update_collapse_state(config, &args.toggle)?;
    let source = create_chat_source(config)?;

    if args.watch {
        return watch_history(config, source, &collapse, options).await;
    }

    let mut groups = source.list_chat_groups().await?;
    history::sort_newest_first(&mut groups);
    let buckets = history::bucketize(&groups, &Local::now());

    if args.json {
        print_json(&buckets)
    } else {
        print!("{}", tui::render_history(&buckets, &collapse, options));
        Ok(())
    }
}

async fn watch_history(
    config: &config::Config,
    source: Arc<dyn ChatSource>,
    collapse: &CollapseState,
    options: &utils::DisplayOptions,
) -> Result<()> {
    let poller: Poller<Vec<ChatGroupSummary>> =
        Poller::new(Duration::from_secs(config.history.refresh_interval_seconds));
    let mut updates = poller.subscribe();

    let runner = poller.clone();
    let poll_task = tokio::spawn(async move {
        runner
            .run(move || {
                let source = source.clone();
                async move { source.list_chat_groups().await }
            })
            .await;
    });

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let update = updates.borrow_and_update().clone();
                match update {
                    Some(PollUpdate { outcome: Ok(mut groups), .. }) => {
                        history::sort_newest_first(&mut groups);
                        let buckets = history::bucketize(&groups, &Local::now());
                        execute!(stdout(), Clear(ClearType::All), MoveTo(0, 0))?;
                        print!("{}", tui::render_history(&buckets, collapse, options));
                        println!(
                            "Refreshing every {}s. Press Ctrl+C to stop.",
                            poller.interval().as_secs()
                        );
                    }
                    Some(PollUpdate { outcome: Err(message), .. }) => {
                        eprintln!("Error refreshing chat history: {message}");
                    }
                    None => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                poller.supersede();
                break;
            }
        }
    }

    poll_task.abort();
    Ok(())
}

async fn run_chat(
    config: &config::Config,
    args: ChatArgs,
    options: &utils::DisplayOptions,
) -> Result<()> {
    let source = create_chat_source(config)?;
    let events = source.list_chat_events(&args.group_id).await?;
    let top = args.top.unwrap_or(config.history.top_emotions);
    let history = emotions::process_history(&events, top);

    if args.json {
        print_json(&history)
    } else {
        print!("{}", tui::render_chat(&args.group_id, &history, options));
        Ok(())
    }
}

fn configured_sport(config: &config::Config) -> Result<&'static sports::SportConfig> {
    sports::get_sport(&config.athlete.sport)
        .with_context(|| format!("Unknown sport in config: {}", config.athlete.sport))
}

fn handle_schedule_subcommand(config: &config::Config, args: ScheduleArgs) -> Result<()> {
    let store = ScheduleStore::open()?;

    match args.subcommand {
        ScheduleSubcommands::Add {
            date,
            time,
            opponent,
            venue,
            notes,
        } => {
            let schedule = store.add(NewSchedule {
                date,
                time,
                opponent,
                venue,
                notes,
            })?;
            println!(
                "✅ Scheduled session {} on {} at {}",
                schedule.id, schedule.date, schedule.time
            );
        }
        ScheduleSubcommands::List { json } => {
            let schedules = store.list()?;
            if json {
                print_json(&schedules)?;
            } else {
                print!("{}", tui::render_schedules(&schedules));
            }
        }
        ScheduleSubcommands::Remove { id } => {
            if !store.remove(&id)? {
                anyhow::bail!("No scheduled session with id {id}");
            }
            println!("🗑️  Removed scheduled session {id}");
        }
        ScheduleSubcommands::Active { json } => {
            let schedules = store.list()?;
            let active = schedule::find_active_session(&schedules, &Local::now());
            if json {
                print_json(&active)?;
            } else {
                print!(
                    "{}",
                    tui::render_active_session(active.as_ref(), configured_sport(config)?)
                );
            }
        }
    }

    Ok(())
}

/// Emotions of the user over one check-in conversation, if one was given.
async fn session_emotions(
    source: Option<&Arc<dyn ChatSource>>,
    group_id: Option<&str>,
) -> Result<Vec<EmotionScore>> {
    match (source, group_id) {
        (Some(source), Some(id)) => {
            let events = source
                .list_chat_events(id)
                .await
                .with_context(|| format!("Failed to load chat {id}"))?;
            Ok(emotions::top_emotions_over_conversation(
                &events,
                analytics::SESSION_EMOTION_COUNT,
            ))
        }
        _ => Ok(Vec::new()),
    }
}

async fn record_result(config: &config::Config, args: RecordArgs) -> Result<types::SessionResult> {
    let date = match args.date.as_deref() {
        Some(date) => schedule::parse_date(date)?,
        None => Local::now().date_naive(),
    };
    let metrics = args
        .metrics
        .iter()
        .map(String::as_str)
        .map(analytics::parse_metric)
        .collect::<Result<Vec<_>>>()?;

    let source = if args.pre_chat.is_some() || args.post_chat.is_some() {
        Some(create_chat_source(config)?)
    } else {
        None
    };

    let (pre_session, post_session) = futures::future::try_join(
        session_emotions(source.as_ref(), args.pre_chat.as_deref()),
        session_emotions(source.as_ref(), args.post_chat.as_deref()),
    )
    .await?;

    ResultsStore::open()?.record(NewSessionResult {
        schedule_id: args.schedule_id,
        sport: args.sport.unwrap_or_else(|| config.athlete.sport.clone()),
        date,
        outcome: args.outcome,
        metrics,
        pre_session,
        post_session,
        notes: args.notes,
    })
}

async fn handle_results_subcommand(
    config: &config::Config,
    args: ResultsArgs,
    options: &utils::DisplayOptions,
) -> Result<()> {
    match args.subcommand {
        ResultsSubcommands::Record(record) => {
            let result = record_result(config, record).await?;
            println!(
                "✅ Recorded {} for {} on {}",
                match result.outcome {
                    Outcome::Win => "win",
                    Outcome::Loss => "loss",
                },
                result.sport,
                result.date
            );
        }
        ResultsSubcommands::List { json } => {
            let results = ResultsStore::open()?.list()?;
            if json {
                print_json(&results)?;
            } else {
                print!("{}", tui::render_results(&results, options));
            }
        }
    }

    Ok(())
}

fn run_analytics(args: AnalyticsArgs, options: &utils::DisplayOptions) -> Result<()> {
    let sport = match args.sport.as_deref() {
        Some(name) => Some(
            sports::get_sport(name).with_context(|| format!("Unknown sport: {name}"))?,
        ),
        None => None,
    };

    let results = ResultsStore::open()?.list()?;
    let filter = AnalyticsFilter {
        period: args.period,
        sport: sport.map(|s| s.slug.to_string()),
    };
    let summary = analytics::summarize(&results, &filter, Local::now().date_naive());

    if args.json {
        return print_json(&summary);
    }

    let mut heading = args
        .period
        .map(|p| p.label().to_string())
        .unwrap_or_else(|| "All Time".to_string());
    if let Some(sport) = sport {
        heading = format!("{heading} ({})", sport.name);
    }
    print!("{}", tui::render_analytics(&summary, &heading, options));
    Ok(())
}

async fn handle_config_subcommand(config_args: ConfigArgs) {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => {
            if let Err(e) = config::create_default_config(overwrite) {
                eprintln!("Error creating config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Show => {
            if let Err(e) = config::show_config() {
                eprintln!("Error showing config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Set { key, value } => {
            if let Err(e) = config::set_config_value(&key, &value) {
                eprintln!("Error setting config: {e}");
                std::process::exit(1);
            }
        }
    }
}
