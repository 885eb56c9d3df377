use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use llm_duet::config::DEFAULT_PROVIDER_CONFIG;
use llm_duet::export::{PdfExporter, SessionJsonExporter};
use llm_duet::gateway::OpenAIGateway;
use llm_duet::observability::{self, LogTarget, ObservabilityConfig};
use llm_duet::{
    CompletionGateway, Duet, DuetConfig, OutputLayout, Preset, ProviderConfig, Referee, SessionFile, StopReason,
    TurnReport,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Level, warn};

#[derive(Parser)]
#[command(name = "llm-duet")]
#[command(version, about = "Relay a conversation between two LLM agents")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Provider catalog with endpoint settings and deployable models
    #[arg(long, global = true, default_value = DEFAULT_PROVIDER_CONFIG)]
    pub config: PathBuf,

    /// Root directory for PDFs, session files and presets
    #[arg(long, global = true, default_value = "outputs")]
    pub output: PathBuf,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the models in the provider catalog
    Models,
    /// Run a conversation from a preset, optionally resuming a saved session
    Run {
        /// Preset file with names, system prompts and parameters
        #[arg(short, long)]
        preset: PathBuf,

        /// Session JSON to continue from
        #[arg(short, long)]
        resume: Option<PathBuf>,

        /// Number of exchanges; overrides the preset
        #[arg(short, long)]
        turns: Option<u32>,

        /// Deployment for agent A (defaults to the first catalog entry)
        #[arg(long)]
        model_a: Option<String>,

        /// Deployment for agent B (defaults to the first catalog entry)
        #[arg(long)]
        model_b: Option<String>,

        /// Deployment used by the referee; enables the referee
        #[arg(long)]
        referee_model: Option<String>,

        /// Ask "Continue?" after every exchange
        #[arg(short, long)]
        interactive: bool,

        /// Gateway request timeout in seconds
        #[arg(long, default_value = "120")]
        timeout: u64,
    },
    /// Manage presets
    Preset {
        #[command(subcommand)]
        command: PresetCommands,
    },
}

#[derive(Subcommand)]
pub enum PresetCommands {
    /// Write a preset under <output>/presets/
    Save {
        /// Preset file name; `.json` is appended when missing
        file: String,
        #[arg(long, default_value = "")]
        name_a: String,
        #[arg(long, default_value = "")]
        name_b: String,
        #[arg(long, default_value = "")]
        sys_a: String,
        #[arg(long, default_value = "")]
        sys_b: String,
        #[arg(long, default_value = "")]
        seed_a: String,
        #[arg(long, default_value = "")]
        seed_b: String,
        #[arg(long, default_value = "")]
        max_tokens_a: String,
        #[arg(long, default_value = "")]
        max_tokens_b: String,
        #[arg(long, default_value = "")]
        color_a: String,
        #[arg(long, default_value = "")]
        color_b: String,
        #[arg(long, default_value = "")]
        turns: String,
        #[arg(long)]
        referee: bool,
        /// Base name for exported PDF and session files
        #[arg(long, default_value = "")]
        file_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let target = match cli.log_file.clone() {
        Some(path) => LogTarget::File(path),
        None => LogTarget::Console,
    };
    observability::init(ObservabilityConfig { level, target })
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize logging")?;

    let layout = OutputLayout::new(cli.output.clone());

    match &cli.command {
        Commands::Models => cmd_models(&cli.config)?,
        Commands::Run {
            preset,
            resume,
            turns,
            model_a,
            model_b,
            referee_model,
            interactive,
            timeout,
        } => {
            let options = RunOptions {
                preset,
                resume: resume.as_deref(),
                turns: *turns,
                model_a: model_a.as_deref(),
                model_b: model_b.as_deref(),
                referee_model: referee_model.as_deref(),
                interactive: *interactive,
                timeout: Duration::from_secs(*timeout),
            };
            cmd_run(&cli.config, &layout, options).await?;
        }
        Commands::Preset { command } => match command {
            PresetCommands::Save {
                file,
                name_a,
                name_b,
                sys_a,
                sys_b,
                seed_a,
                seed_b,
                max_tokens_a,
                max_tokens_b,
                color_a,
                color_b,
                turns,
                referee,
                file_name,
            } => {
                let preset = Preset {
                    name_a: name_a.clone(),
                    name_b: name_b.clone(),
                    sys_a: sys_a.clone(),
                    sys_b: sys_b.clone(),
                    seed_a: seed_a.clone(),
                    max_tokens_a: max_tokens_a.clone(),
                    color_a: color_a.clone(),
                    seed_b: seed_b.clone(),
                    max_tokens_b: max_tokens_b.clone(),
                    color_b: color_b.clone(),
                    turns: turns.clone(),
                    referee: *referee,
                    file_name: file_name.clone(),
                };
                let path = layout.preset_path(file);
                preset
                    .save(&path)
                    .with_context(|| format!("Failed to save preset {}", path.display()))?;
                println!("Preset saved to {}", path.display());
            }
        },
    }

    Ok(())
}

fn cmd_models(config_path: &Path) -> Result<()> {
    let provider = ProviderConfig::load(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let models = provider.require_models()?;

    println!("{:<32} MODEL", "DEPLOYMENT");
    for model in models {
        println!("{:<32} {}", model.deployment, model.model_name);
    }
    Ok(())
}

struct RunOptions<'a> {
    preset: &'a Path,
    resume: Option<&'a Path>,
    turns: Option<u32>,
    model_a: Option<&'a str>,
    model_b: Option<&'a str>,
    referee_model: Option<&'a str>,
    interactive: bool,
    timeout: Duration,
}

async fn cmd_run(config_path: &Path, layout: &OutputLayout, options: RunOptions<'_>) -> Result<()> {
    let provider = ProviderConfig::load(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let deployment_a = provider.resolve_deployment(options.model_a)?;
    let deployment_b = provider.resolve_deployment(options.model_b)?;

    let preset = Preset::load(options.preset)
        .with_context(|| format!("Failed to load preset {}", options.preset.display()))?;
    let config = preset.to_config(&deployment_a, &deployment_b, options.turns)?;

    let gateway = OpenAIGateway::from_provider(&provider)
        .and_then(|gateway| gateway.with_timeout(options.timeout))
        .context("Failed to configure the model gateway")?;
    gateway
        .is_available()
        .await
        .with_context(|| format!("{} is not ready", gateway.name()))?;

    let turns = config.turns;
    let mut duet = build_duet(config, gateway, layout, options.resume)?;
    if let Some(model) = options.referee_model {
        let model = provider.resolve_deployment(Some(model))?;
        duet = duet.with_referee(Referee::new().with_model(model));
    }

    duet.start(turns)?;
    drive(&mut duet, options.interactive).await?;

    if let Some(status) = duet.status() {
        println!("\n{status}");
    }
    match duet.stop_reason() {
        Some(StopReason::BudgetExhausted) => println!("\nAll {turns} turns completed."),
        Some(StopReason::RefereeVeto) => println!("\nStopped by the referee."),
        Some(StopReason::UserStop) | None => println!("\nStopped."),
    }
    for path in duet.exported_paths() {
        println!("Saved {}", path.display());
    }
    Ok(())
}

fn build_duet(
    config: DuetConfig,
    gateway: OpenAIGateway,
    layout: &OutputLayout,
    resume: Option<&Path>,
) -> Result<Duet<OpenAIGateway>> {
    let pdf = PdfExporter::new(layout.clone())
        .with_label_color(config.a.display_label(), config.a.params.color.clone())
        .with_label_color(config.b.display_label(), config.b.params.color.clone());
    let json = SessionJsonExporter::new(layout.clone());

    let duet = match resume {
        Some(path) => {
            let session = SessionFile::load(path)
                .with_context(|| format!("Failed to load session {}", path.display()))?;
            Duet::from_session(config, gateway, session)?
        }
        None => Duet::new(config, gateway)?,
    };

    Ok(duet.with_exporter(pdf).with_exporter(json))
}

/// Advances until the session stops. On a gateway failure, an interactive
/// user may retry; otherwise the session is stopped so the exchanges so far
/// are exported, and the error is returned.
async fn drive<G: CompletionGateway>(duet: &mut Duet<G>, interactive: bool) -> Result<()> {
    while !duet.is_stopped() {
        match duet.advance().await {
            Ok(report) => {
                print_turn(duet, &report);
                if interactive && !report.is_final() && !confirm("Continue?", true) {
                    duet.stop()?;
                }
            }
            Err(err) => {
                eprintln!("\n[error] {err}");
                if interactive && confirm("Retry the failed request?", true) {
                    duet.retry()?;
                    continue;
                }
                if let Err(stop_err) = duet.stop() {
                    warn!(error = %stop_err, "Export failed while stopping after an error");
                    eprintln!("[error] {stop_err}");
                }
                return Err(err.into());
            }
        }
    }
    Ok(())
}

fn print_turn<G: CompletionGateway>(duet: &Duet<G>, report: &TurnReport) {
    let label = duet.config().participant(report.side).display_label();
    println!("\n{label}\n{}", report.content);
}

fn confirm(prompt: &str, default: bool) -> bool {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm_duet::export::{ExportView, SessionExporter};
    use llm_duet::{CompletionRequest, DuetError, ExportError, GatewayError, ParticipantConfig, Side};

    struct DownGateway;

    #[async_trait]
    impl CompletionGateway for DownGateway {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, GatewayError> {
            Err(GatewayError::Transport("connection refused".into()))
        }
    }

    struct ReadOnlyExporter;

    impl SessionExporter for ReadOnlyExporter {
        fn export(&self, _view: &ExportView<'_>) -> Result<PathBuf, ExportError> {
            Err(ExportError::Pdf("read-only output".into()))
        }
    }

    fn config() -> DuetConfig {
        DuetConfig {
            a: ParticipantConfig::new(Side::A, "Alice", "model-a", "You are Alice."),
            b: ParticipantConfig::new(Side::B, "Bob", "model-b", "You are Bob."),
            turns: 2,
            referee: false,
            file_name: "cli".into(),
        }
    }

    #[tokio::test]
    async fn test_drive_reports_gateway_error_when_export_also_fails() {
        let mut duet = Duet::new(config(), DownGateway)
            .unwrap()
            .with_exporter(ReadOnlyExporter);
        duet.start(2).unwrap();

        let err = drive(&mut duet, false).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DuetError>(),
            Some(DuetError::Gateway(GatewayError::Transport(_)))
        ));
        assert!(duet.is_stopped());
    }
}
