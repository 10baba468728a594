//! linelock - capture-line locking harness
//!
//! Subcommands:
//! - `linelock devices` - List audio endpoints and the one record attempts use
//! - `linelock scenarios` - List the built-in scenarios
//! - `linelock run <name>` - Run a built-in scenario
//! - `linelock steps <step>...` - Run an ad-hoc step list
//! - `linelock console` - Interactive r/f/c/q command loop

use std::io::{self, BufReader};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use linelock_core::session::catalog;
use linelock_core::{
    AcknowledgmentMode, ApartmentMode, BarrierPrompt, CommandLoop, ConsoleSettings, ContextId,
    HarnessConfig, HarnessError, Outcome, ResultReporter, Scenario, ScenarioSequencer,
    ScenarioStep, ScenarioTrace, SequencerDelegate, TriggerKind,
};

mod backend;

use backend::{Backend, Defect};

#[derive(Parser)]
#[command(name = "linelock")]
#[command(about = "Reproduce capture lines that stop opening after a session lock")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Platform to run against
    #[arg(long, global = true, value_enum, env = "LINELOCK_BACKEND", default_value = "simulated")]
    backend: Backend,

    /// COM apartment model for com-init triggers (sta or mta)
    #[arg(long, global = true, default_value = "sta")]
    apartment: ApartmentMode,

    /// Capture device id or name fragment instead of the secondary device
    #[arg(long, global = true, env = "LINELOCK_DEVICE")]
    device: Option<String>,

    /// Defects reproduced by the simulated backend
    #[arg(long, global = true, value_enum, default_value = "observed")]
    defect: Defect,

    /// Acknowledge barriers automatically after MS milliseconds
    #[arg(long, global = true, value_name = "MS", num_args = 0..=1, default_missing_value = "0")]
    auto_ack: Option<u64>,

    /// Print the trace as JSON instead of text lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List audio endpoints and the device record attempts resolve to
    Devices,

    /// List the built-in scenarios
    Scenarios {
        /// Trigger used by the listed scenarios
        #[arg(short, long, default_value = "file-dialog")]
        trigger: TriggerKind,
    },

    /// Run a built-in scenario
    Run {
        /// Scenario name (see `linelock scenarios`)
        name: String,

        /// Trigger under suspicion (file-dialog or com-init)
        #[arg(short, long, default_value = "file-dialog")]
        trigger: TriggerKind,
    },

    /// Run an ad-hoc step list, e.g. `record@w1 dialog@w1 barrier record@w1`
    Steps {
        /// Steps as op@context; op is r, f, c or b
        #[arg(required = true)]
        steps: Vec<String>,
    },

    /// Interactive loop: r records, f creates a file dialog, c initializes COM, q quits
    Console {
        /// Context the commands run on
        #[arg(short, long)]
        context: Option<ContextId>,
    },
}

impl Cli {
    fn config(&self) -> HarnessConfig {
        HarnessConfig {
            apartment_mode: self.apartment,
            device_override: self.device.clone(),
            acknowledgment: match self.auto_ack {
                Some(ms) => AcknowledgmentMode::Auto {
                    delay: Duration::from_millis(ms),
                },
                None => AcknowledgmentMode::Prompt,
            },
            ..Default::default()
        }
    }
}

/// Prints each outcome as soon as its step completes.
struct LiveOutput;

impl SequencerDelegate for LiveOutput {
    fn on_step_started(&self, index: usize, step: &ScenarioStep) {
        log::debug!("Step {} started: {} on {}", index + 1, step.operation, step.context);
    }

    fn on_barrier(&self, prompt: &BarrierPrompt) {
        log::info!("Barrier at step {}", prompt.step_index + 1);
    }

    fn on_step_finished(&self, outcome: &Outcome) {
        println!("{}", ResultReporter::render_line(outcome));
    }

    fn on_aborted(&self, index: usize, error: &HarnessError) {
        eprintln!("Run aborted at step {}: {}", index + 1, error);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.config();
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    match &cli.command {
        Commands::Scenarios { trigger } => {
            for scenario in catalog::catalog(*trigger) {
                let steps: Vec<String> = scenario.steps.iter().map(ToString::to_string).collect();
                println!("{:<38} {}", scenario.name, scenario.description);
                println!("{:<38} {}", "", steps.join(" "));
            }
        }
        Commands::Devices => {
            let bindings = backend::bindings(cli.backend, cli.defect, &config)?;
            let sequencer = ScenarioSequencer::new(bindings, &config);
            list_devices(&sequencer)?;
        }
        Commands::Run { name, trigger } => {
            let scenario = catalog::find(name, *trigger)
                .with_context(|| format!("no built-in scenario named {}", name))?;
            run_scenario(&cli, &config, &scenario)?;
        }
        Commands::Steps { steps } => {
            let scenario = Scenario::parse_steps("ad-hoc", &steps.join(" "))
                .context("invalid step list")?;
            run_scenario(&cli, &config, &scenario)?;
        }
        Commands::Console { context } => {
            let bindings = backend::bindings(cli.backend, cli.defect, &config)?;
            let sequencer = ScenarioSequencer::new(bindings, &config);
            let settings = ConsoleSettings {
                context: context.unwrap_or(config.console_context),
            };
            let trace = CommandLoop::new(&sequencer)
                .run(BufReader::new(io::stdin()), io::stdout(), &settings)
                .context("command loop failed")?;
            print_result(&cli, &trace, false)?;
        }
    }

    Ok(())
}

fn list_devices(sequencer: &ScenarioSequencer) -> Result<()> {
    let resolver = sequencer.resolver();
    let selected = resolver.resolve();
    let devices = resolver
        .audio()
        .enumerate()
        .context("failed to enumerate audio devices")?;

    for device in &devices {
        let marker = match &selected {
            Ok(s) if s.id == device.id => "->",
            _ => "  ",
        };
        let kind = if device.supports_capture { "capture" } else { "render" };
        let default = if device.is_default_capture { " (default)" } else { "" };
        println!("{} {:<8} {}{}  [{}]", marker, kind, device.name, default, device.id);
    }

    if let Err(e) = selected {
        println!("No device resolves for record attempts: {}", e);
    }
    Ok(())
}

fn run_scenario(cli: &Cli, config: &HarnessConfig, scenario: &Scenario) -> Result<()> {
    let bindings = backend::bindings(cli.backend, cli.defect, config)?;
    let mut sequencer = ScenarioSequencer::new(bindings, config);
    if !cli.json {
        sequencer.set_delegate(Arc::new(LiveOutput));
    }

    let trace = sequencer
        .run(scenario)
        .with_context(|| format!("scenario {} aborted", scenario.name))?;
    print_result(cli, &trace, true)
}

fn print_result(cli: &Cli, trace: &ScenarioTrace, lines_printed: bool) -> Result<()> {
    if cli.json {
        println!("{}", ResultReporter::to_json(trace)?);
    } else if lines_printed {
        println!("{} passed, {} failed", trace.passed(), trace.failed());
    } else {
        println!("{}", ResultReporter::summary(trace));
    }
    Ok(())
}
