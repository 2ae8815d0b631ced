use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::agent_engine::engine::AgentEngine;
use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::persona::{self, build_prompt};
use crate::agent_engine::state::{LoopConfig, RunMode, StopReason};
use crate::config::{self, AppConfig, BackendKind, CONFIG_FILE_NAME};
use crate::errors::{AgentError, AgentResult};
use crate::executor::input::EnigoActuator;
use crate::executor::speech::SpeechCommand;
use crate::perception::screenshot::{save_frame, XcapFrameSource};
use crate::perception::still::StillFrameSource;
use crate::perception::traits::FrameSource;
use crate::probe;
use crate::setup;
use crate::vlm::provider::VisionModel;
use crate::vlm::registry::build_backend;

#[derive(Parser)]
#[command(name = "lumine", version, about = "Vision-model game agent")]
pub struct Cli {
    /// Path to config.toml (default: next to the binary, then the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the perceive-reason-act loop (default)
    Run(RunArgs),

    /// Send one screenshot to the backend and print the response
    Probe {
        image: PathBuf,
        #[arg(long)]
        instruction: Option<String>,
        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Send every screenshot in a directory and write a text report
    Batch {
        dir: PathBuf,
        /// Report directory
        #[arg(long, default_value = "results")]
        out: PathBuf,
        #[arg(long)]
        instruction: Option<String>,
        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Ask the backend whether the model is loaded
    Health {
        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Save one screenshot
    Capture { file: PathBuf },

    /// List the persona catalog
    Personas,

    /// Write a default config.toml
    InitConfig {
        #[arg(default_value = CONFIG_FILE_NAME)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Default)]
pub struct BackendArgs {
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,
    /// Remote server URL
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Args, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub backend: BackendArgs,
    /// Persona id, catalog number or `custom`
    #[arg(long)]
    pub persona: Option<String>,
    /// Goal for the custom persona
    #[arg(long)]
    pub goal: Option<String>,
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Replay this image instead of capturing the screen
    #[arg(long)]
    pub frame: Option<PathBuf>,
    #[arg(long)]
    pub max_iterations: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum BackendArg {
    Dummy,
    Openai,
    Remote,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Dummy => BackendKind::Dummy,
            BackendArg::Openai => BackendKind::Openai,
            BackendArg::Remote => BackendKind::Remote,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Action,
    /// Describe the scene; only spoken lines reach the devices
    Describe,
}

impl From<ModeArg> for RunMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Action => RunMode::Action,
            ModeArg::Describe => RunMode::Describe,
        }
    }
}

impl BackendArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(kind) = self.backend {
            config.backend.kind = Some(kind.into());
        }
        if let Some(url) = &self.url {
            config.backend.remote.url = Some(url.clone());
        }
    }
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) {
        self.backend.apply(config);
        if let Some(persona) = &self.persona {
            config.agent.persona = Some(persona.clone());
        }
        if let Some(goal) = &self.goal {
            config.agent.custom_goal = Some(goal.clone());
            if self.persona.is_none() && config.agent.persona.is_none() {
                config.agent.persona = Some(persona::CUSTOM_PERSONA_ID.to_string());
            }
        }
        if let Some(mode) = self.mode {
            config.agent.mode = Some(mode.into());
        }
        if let Some(max) = self.max_iterations {
            config.agent.max_iterations = Some(max);
        }
    }
}

/// Runs the parsed command. Exit code 1 means the agent loop died on an error.
pub async fn execute(cli: Cli) -> AgentResult<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => {
            let mut config = config::load_config(config_path)?;
            args.apply(&mut config);
            run_agent(config, args.frame.as_deref()).await
        }
        Command::Probe {
            image,
            instruction,
            backend,
        } => {
            let model = interactive_backend(config_path, &backend)?;
            let instruction = instruction.as_deref().unwrap_or(probe::DEFAULT_PROBE_INSTRUCTION);
            let outcome = probe::probe_image(model.as_ref(), &image, instruction).await?;
            println!(
                "{} ({}x{}, {:.1} KB)",
                image.display(),
                outcome.width,
                outcome.height,
                outcome.file_size_kb
            );
            println!("Response:\n{}", outcome.response);
            println!("Parsed action: {:?}", outcome.action);
            Ok(ExitCode::SUCCESS)
        }
        Command::Batch {
            dir,
            out,
            instruction,
            backend,
        } => {
            let model = interactive_backend(config_path, &backend)?;
            let instruction = instruction.as_deref().unwrap_or(probe::DEFAULT_PROBE_INSTRUCTION);
            let entries = probe::run_batch(model.as_ref(), &dir, instruction).await?;
            let report = probe::write_report(&entries, model.name(), &out)?;
            let ok = entries.iter().filter(|e| e.is_success()).count();
            println!(
                "{ok}/{} succeeded; report written to {}",
                entries.len(),
                report.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Health { backend } => {
            let model = interactive_backend(config_path, &backend)?;
            let status = model.health().await?;
            println!("{}: {status}", model.name());
            Ok(ExitCode::SUCCESS)
        }
        Command::Capture { file } => {
            let config = config::load_config(config_path)?;
            let frame = XcapFrameSource::new(config.capture.monitor_index)
                .capture()
                .await?;
            save_frame(&frame, &file)?;
            println!(
                "saved {}x{} screenshot to {}",
                frame.meta.width,
                frame.meta.height,
                file.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Personas => {
            for (i, p) in persona::catalog().iter().enumerate() {
                println!("{}. {:<16} {}", i + 1, p.id, p.goal);
            }
            println!("   {:<16} --goal \"<your goal>\"", persona::CUSTOM_PERSONA_ID);
            Ok(ExitCode::SUCCESS)
        }
        Command::InitConfig { path, force } => {
            if path.exists() && !force {
                return Err(AgentError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            config::save_config(&AppConfig::default(), &path)?;
            println!("wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn interactive_backend(
    config_path: Option<&Path>,
    args: &BackendArgs,
) -> AgentResult<Arc<dyn VisionModel>> {
    let mut config = config::load_config(config_path)?;
    args.apply(&mut config);
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    setup::complete_backend(&mut config, &mut stdin.lock(), &mut stdout)?;
    build_backend(&config.backend)
}

async fn run_agent(mut config: AppConfig, still_frame: Option<&Path>) -> AgentResult<ExitCode> {
    let persona = {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        setup::complete(&mut config, &mut stdin.lock(), &mut stdout)?
    };
    let mode = config.agent.mode.unwrap_or(RunMode::Action);

    let model = build_backend(&config.backend)?;
    let frames: Arc<dyn FrameSource> = match still_frame {
        Some(path) => Arc::new(StillFrameSource::new(path)),
        None => Arc::new(XcapFrameSource::new(config.capture.monitor_index)),
    };
    let actuator = Arc::new(EnigoActuator::new(SpeechCommand::from_config(
        config.actuator.speech_command.as_deref(),
    )));
    let describe_interval = Duration::try_from_secs_f64(config.agent.describe_interval_secs)
        .map_err(|_| {
            AgentError::Config(format!(
                "invalid describe_interval_secs {}",
                config.agent.describe_interval_secs
            ))
        })?;

    let prompt = build_prompt(&persona, mode);
    let mut engine = AgentEngine::new(frames, model, actuator.clone(), prompt)
        .with_parse_fallback(config.agent.parse_fallback)
        .with_describe_interval(describe_interval)
        .with_loop_config(LoopConfig {
            max_iterations: config.agent.max_iterations,
            max_duration_minutes: config.agent.max_duration_minutes,
        });
    if config.agent.record_history {
        engine = engine.with_history(SessionHistory::new()?);
    }

    let cancel = CancellationToken::new();
    let interrupts = Box::pin(futures_util::stream::unfold((), |()| async {
        tokio::signal::ctrl_c().await.ok().map(|()| ((), ()))
    }));
    let held = Arc::clone(&actuator);
    tokio::spawn(watch_interrupts(interrupts, cancel.clone(), move || {
        held.release_held_keys();
        std::process::exit(130);
    }));

    println!(
        "Agent running as {} ({:?} mode). Press Ctrl+C to stop, twice to force.",
        persona.display_name, mode
    );
    match engine.run_loop(&cancel).await {
        StopReason::Fatal(_) => Ok(ExitCode::FAILURE),
        StopReason::Cancelled | StopReason::LimitReached => Ok(ExitCode::SUCCESS),
    }
}

/// First interrupt cancels `cancel` so the loop stops after the current
/// iteration. A second one runs `force`.
async fn watch_interrupts<S, F>(mut interrupts: S, cancel: CancellationToken, force: F)
where
    S: Stream<Item = ()> + Unpin,
    F: FnOnce(),
{
    if interrupts.next().await.is_none() {
        return;
    }
    tracing::info!("interrupt received; stopping after the current iteration");
    cancel.cancel();

    if interrupts.next().await.is_some() {
        tracing::warn!("second interrupt; releasing held keys and exiting");
        force();
    }
}
