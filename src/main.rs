use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use storyreel::config::{Config, ConfigOverrides, Provider};
use storyreel::error::{find_storyboard_error, ErrorEnvelope};
use storyreel::logging::{self, LogTarget};
use storyreel::orchestrator;
use storyreel::render::{render_frame_text, render_storyboard_text};
use storyreel::response::{decode_storyboard, ValidationPolicy};
use storyreel::schema::Storyboard;
use storyreel::source::{build_source, ReplaySource, StoryboardSource};

#[derive(Debug, Parser)]
#[command(name = "storyreel")]
#[command(about = "Turn code explanations into step-by-step terminal storyboards")]
#[command(version, long_version = env!("STORYREEL_LONG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./storyreel.yaml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_parser = Provider::parse)]
    provider: Option<Provider>,

    #[arg(long, global = true)]
    model: Option<String>,

    /// Reject responses with malformed frames instead of warning.
    #[arg(long, global = true, default_value_t = false)]
    strict: bool,

    /// Print failures as a JSON envelope on stderr.
    #[arg(long = "json-errors", global = true, default_value_t = false)]
    json_errors: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(long = "log-file", global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a storyboard and print or save it as JSON.
    Generate {
        /// Explanation text; defaults to the configured initial input.
        explanation: Option<String>,
        #[arg(long = "input-file", conflicts_with = "explanation")]
        input_file: Option<PathBuf>,
        /// Output file, or a directory for a timestamped file.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
        /// Decode a saved model response instead of calling a model.
        #[arg(long)]
        replay: Option<PathBuf>,
    },
    /// Decode a saved response or storyboard and summarize it.
    Check { file: PathBuf },
    /// Print the frames of a saved storyboard as text.
    Render {
        file: PathBuf,
        /// Only this 1-based frame.
        #[arg(long)]
        frame: Option<usize>,
        #[arg(long = "hide-comments", default_value_t = false)]
        hide_comments: bool,
    },
    /// Interactive terminal player.
    Play {
        /// Open a saved storyboard instead of starting empty.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Serve generations from a saved model response.
        #[arg(long)]
        replay: Option<PathBuf>,
        /// Initial explanation text.
        #[arg(long)]
        input: Option<String>,
        /// Submit the initial explanation on start.
        #[arg(long, default_value_t = false)]
        generate: bool,
        #[arg(long = "autoplay-ms")]
        autoplay_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(&error, json_errors),
    }
}

fn report(error: &anyhow::Error, json_errors: bool) -> ExitCode {
    if json_errors {
        let envelope = ErrorEnvelope::from_anyhow(error);
        match serde_json::to_string(&envelope) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("error: {error:#}"),
        }
    } else {
        eprintln!("error: {error:#}");
    }

    if find_storyboard_error(error).is_some() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

async fn run(cli: Cli) -> Result<()> {
    let interactive = is_interactive(&cli.command);
    let target = match (&cli.log_file, interactive) {
        (Some(path), _) => LogTarget::File(path.clone()),
        (None, true) => LogTarget::Silent,
        (None, false) => LogTarget::Stderr,
    };
    logging::init(cli.verbose, target)?;

    let overrides = ConfigOverrides {
        config_path: cli.config.clone(),
        provider: cli.provider,
        model: cli.model.clone(),
        strict: cli.strict,
        autoplay_interval_ms: autoplay_override(&cli.command),
    };
    let config = Config::load(&overrides)?;
    info!(provider = ?config.provider, model = %config.model, "configuration loaded");

    match cli.command {
        Commands::Generate {
            explanation,
            input_file,
            output,
            replay,
        } => run_generate(&config, explanation, input_file, output, replay).await,
        Commands::Check { file } => run_check(&file, config.validation),
        Commands::Render {
            file,
            frame,
            hide_comments,
        } => run_render(&file, config.validation, frame, !hide_comments),
        Commands::Play {
            file,
            replay,
            input,
            generate,
            ..
        } => run_play(config, file, replay, input, generate).await,
    }
}

fn is_interactive(command: &Commands) -> bool {
    matches!(command, Commands::Play { .. })
}

fn autoplay_override(command: &Commands) -> Option<u64> {
    match command {
        Commands::Play { autoplay_ms, .. } => *autoplay_ms,
        _ => None,
    }
}

fn select_source(config: &Config, replay: Option<PathBuf>) -> Result<Arc<dyn StoryboardSource>> {
    match replay {
        Some(path) => Ok(Arc::new(ReplaySource::new(path, config.validation))),
        None => Ok(build_source(config)?),
    }
}

async fn run_generate(
    config: &Config,
    explanation: Option<String>,
    input_file: Option<PathBuf>,
    output: Option<PathBuf>,
    replay: Option<PathBuf>,
) -> Result<()> {
    let input = match (explanation, input_file) {
        (Some(text), _) => text,
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read input {}", path.display()))?,
        (None, None) => config.initial_input.clone(),
    };

    let source = select_source(config, replay)?;
    let storyboard = orchestrator::generate(source.as_ref(), &input).await?;
    let json = storyboard
        .to_json_document()
        .context("failed to serialize storyboard")?;

    match output {
        None => println!("{json}"),
        Some(path) => {
            let path = if path.is_dir() {
                path.join(format!("storyboard-{}.json", Utc::now().format("%Y%m%d-%H%M%S")))
            } else {
                path
            };
            fs::write(&path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "Wrote {} ({} frames)",
                path.display(),
                storyboard.frame_count()
            );
        }
    }
    Ok(())
}

fn load_storyboard(path: &Path, policy: ValidationPolicy) -> Result<Storyboard> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let storyboard = decode_storyboard(&raw, policy)
        .with_context(|| format!("{} is not a usable storyboard", path.display()))?;
    Ok(storyboard)
}

fn run_check(path: &Path, policy: ValidationPolicy) -> Result<()> {
    let storyboard = load_storyboard(path, policy)?;
    println!("OK: {} ({})", path.display(), storyboard.display_title());
    println!("Frames: {}", storyboard.frame_count());
    if storyboard.full_code_block.is_some() {
        println!("Code block: yes");
    }
    Ok(())
}

fn run_render(
    path: &Path,
    policy: ValidationPolicy,
    frame: Option<usize>,
    show_comments: bool,
) -> Result<()> {
    let storyboard = load_storyboard(path, policy)?;
    match frame {
        None => print!("{}", render_storyboard_text(&storyboard, show_comments)),
        Some(position) => {
            let total = storyboard.frame_count();
            if position == 0 || position > total {
                bail!("frame {position} is out of range (storyboard has {total} frames)");
            }
            print!("{}", render_frame_text(&storyboard, position - 1, show_comments));
        }
    }
    Ok(())
}

#[cfg(feature = "play")]
async fn run_play(
    config: Config,
    file: Option<PathBuf>,
    replay: Option<PathBuf>,
    input: Option<String>,
    generate: bool,
) -> Result<()> {
    use storyreel::session::Session;

    let default_input = config.initial_input.clone();
    let mut session = match &file {
        Some(path) => Session::with_storyboard(default_input, load_storyboard(path, config.validation)?),
        None => Session::new(default_input),
    };
    if let Some(text) = input {
        session.set_input(text);
    }

    let source = select_source(&config, replay)?;
    storyreel::player::run(session, source, config.autoplay_interval, generate).await
}

#[cfg(not(feature = "play"))]
async fn run_play(
    _config: Config,
    _file: Option<PathBuf>,
    _replay: Option<PathBuf>,
    _input: Option<String>,
    _generate: bool,
) -> Result<()> {
    bail!("this build of storyreel has no interactive player (enable the `play` feature)")
}
