//! `piper-announce`: provision Piper voices and render spoken announcements.

use announce_assets::{
    current_platform, event_channel, http_client, locate_engine, resolve, resolve_voices_dir,
    AssetError, BinaryProvisioner, DirectoryHints, Downloader, EventSender, ProvisioningSummary,
    Provisioner,
};
use announce_cli::config::{self, Config};
use announce_cli::{spawn_renderer, ProgressMode, RuntimeFlags};
use announce_exec::TokioRunner;
use announce_types::{AssetKind, Catalog, Gender, Platform};
use announce_voice::{
    AnnouncementPipeline, AnnouncementRequest, OpenAiWriter, PipelineConfig, VoiceError,
};
use clap::{Args, Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const REMEDIATION: &str = "Run `piper-announce download` to fetch the voices manually.";

#[derive(Parser, Debug)]
#[command(name = "piper-announce", version, about = "Announcement synthesis with Piper voices")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, env = "ANNOUNCE_CONFIG_PATH", default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show which voices are installed and which engine binary is used
    Status,

    /// Download missing voice files
    Download {
        /// Re-download every voice file
        #[arg(long)]
        force: bool,

        /// Install-time mode: report failures but exit successfully
        #[arg(long)]
        install: bool,
    },

    /// Download the Piper engine release
    DownloadBinaries {
        /// Fetch builds for every supported platform
        #[arg(long)]
        all_platforms: bool,

        /// Reinstall even if the executable exists
        #[arg(long)]
        force: bool,
    },

    /// Install hook; never fails
    Postinstall,

    /// Synthesize an announcement
    Announce(AnnounceArgs),
}

#[derive(Args, Debug)]
struct AnnounceArgs {
    /// Announcement text
    #[arg(long, conflicts_with = "input", required_unless_present = "input")]
    text: Option<String>,

    /// JSON request file (`text`, `lang`, `gender`, `style`, ...)
    #[arg(long)]
    input: Option<PathBuf>,

    #[arg(long, default_value = "en")]
    lang: String,

    #[arg(long, default_value = "female")]
    gender: Gender,

    /// friendly, formal, urgent, custom, ...
    #[arg(long, default_value = "default")]
    style: String,

    /// Tone description for `--style custom`
    #[arg(long)]
    custom_style: Option<String>,

    /// Speaker index for multi-speaker models
    #[arg(long)]
    speaker: Option<u32>,

    /// Skip the mastering chain
    #[arg(long)]
    no_master: bool,

    /// Export format (mp3, opus, m4a); repeatable
    #[arg(long = "format")]
    formats: Vec<String>,

    /// Keep the WAV next to the exported files
    #[arg(long)]
    keep_wav: bool,

    /// Rewrite the text with the language model first
    #[arg(long)]
    rewrite: bool,

    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error("failed to read {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid request file: {0}")]
    InvalidInput(#[from] serde_json::Error),

    #[error("--rewrite needs an API key (writer.api_key or OPENAI_API_KEY)")]
    MissingApiKey,
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn voices_dir(config: &Config) -> Result<PathBuf, AssetError> {
    resolve_voices_dir(&DirectoryHints::detect(config.voices.dir.clone()))
}

fn downloader(config: &Config, events: EventSender) -> Result<Downloader, AssetError> {
    let client = http_client(
        config.download.connect_timeout(),
        config.download.read_timeout(),
    )?;
    Ok(Downloader::new(client, config.download.progress_interval()).with_events(events))
}

/// Runs `work` with a renderer attached to its download events and waits
/// for the renderer to drain once `work` has dropped its sender.
async fn with_progress<T, F, Fut>(flags: RuntimeFlags, work: F) -> T
where
    F: FnOnce(EventSender) -> Fut,
    Fut: Future<Output = T>,
{
    let (tx, rx) = event_channel();
    let renderer = spawn_renderer(rx, ProgressMode::detect(flags.ci));
    let result = work(tx).await;
    if let Err(e) = renderer.await {
        tracing::warn!(error = %e, "progress renderer stopped");
    }
    result
}

fn status(config: &Config) -> Result<ExitCode, CliError> {
    let catalog = Catalog::builtin();
    let dir = voices_dir(config)?;
    let report = resolve(&catalog, &dir);

    println!("Voice directory: {}", dir.display());
    for voice in catalog.voices() {
        let state = match report.missing.iter().find(|m| m.voice.key == voice.key) {
            None => "ready".to_string(),
            Some(m) => {
                let kinds: Vec<&str> = [AssetKind::Model, AssetKind::Config]
                    .into_iter()
                    .filter(|k| m.is_missing(*k))
                    .map(AssetKind::label)
                    .collect();
                format!("missing {}", kinds.join(" + "))
            }
        };
        println!(
            "  {:<4} {:<7} {:<28} {}",
            voice.key.language,
            voice.key.gender.as_str(),
            voice.id,
            state
        );
    }
    println!(
        "{} of {} voices ready",
        report.present.len(),
        catalog.voices().len()
    );

    let engine = locate_engine(config.engine.binary.as_deref(), &config.engine.binaries_dir);
    let found = if engine.is_file() { "" } else { " (not found)" };
    println!("Engine: {}{found}", engine.display());
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &ProvisioningSummary) {
    if summary.is_noop() {
        println!("All voice files already present.");
    } else {
        println!(
            "Downloaded {} of {} file(s); {} failed.",
            summary.succeeded, summary.queued, summary.failed
        );
    }
    for failure in &summary.failures {
        println!("  {}: {}", failure.entry.filename, failure.error);
    }
    let ready: Vec<String> = summary.ready.iter().map(ToString::to_string).collect();
    if ready.is_empty() {
        println!("Ready voices: none");
    } else {
        println!("Ready voices: {}", ready.join(", "));
    }
}

async fn provision_voices(
    config: &Config,
    flags: RuntimeFlags,
    force: bool,
) -> Result<ProvisioningSummary, CliError> {
    let dir = voices_dir(config)?;
    let summary = with_progress(flags, |events| async move {
        let provisioner = Provisioner::new(
            Catalog::builtin(),
            downloader(config, events)?,
            config.download.retry_policy(),
        );
        Ok::<_, AssetError>(provisioner.provision(&dir, force).await)
    })
    .await?;
    Ok(summary)
}

async fn download(
    config: &Config,
    flags: RuntimeFlags,
    force: bool,
    install: bool,
) -> Result<ExitCode, CliError> {
    let summary = provision_voices(config, flags, force).await?;
    print_summary(&summary);

    if summary.is_complete() {
        return Ok(ExitCode::SUCCESS);
    }
    if install {
        println!("{REMEDIATION}");
        return Ok(ExitCode::SUCCESS);
    }
    Ok(ExitCode::FAILURE)
}

async fn download_binaries(
    config: &Config,
    flags: RuntimeFlags,
    all_platforms: bool,
    force: bool,
) -> Result<ExitCode, CliError> {
    if flags.skip_binary_download {
        println!("Skipping engine download (SKIP_BINARY_DOWNLOAD is set).");
        return Ok(ExitCode::SUCCESS);
    }

    let platforms: Vec<Platform> = if all_platforms {
        Platform::ALL.to_vec()
    } else {
        vec![current_platform()?]
    };

    let runner = Arc::new(TokioRunner::new(config.engine.timeout()));
    let summary = with_progress(flags, |events| async move {
        let provisioner = BinaryProvisioner::new(
            downloader(config, events)?,
            runner,
            config.engine.binaries_dir.clone(),
        );
        Ok::<_, AssetError>(provisioner.provision(&platforms, force).await)
    })
    .await?;

    for platform in &summary.installed {
        println!("Installed engine for {platform}");
    }
    for platform in &summary.skipped {
        println!("Engine for {platform} already installed");
    }
    for (platform, error) in &summary.failures {
        println!("Failed to install engine for {platform}: {error}");
    }

    Ok(if summary.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn postinstall(config: &Config, flags: RuntimeFlags) -> ExitCode {
    if flags.skip_voice_download {
        println!("Skipping voice download (SKIP_VOICE_DOWNLOAD is set).");
        return ExitCode::SUCCESS;
    }

    match provision_voices(config, flags, false).await {
        Ok(summary) => {
            print_summary(&summary);
            if !summary.is_complete() {
                println!("{REMEDIATION}");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "voice download failed during install");
            println!("Voice download did not complete: {e}");
            println!("{REMEDIATION}");
        }
    }
    ExitCode::SUCCESS
}

fn load_request(args: &AnnounceArgs) -> Result<AnnouncementRequest, CliError> {
    let mut request = match &args.input {
        Some(path) => {
            let contents = std::fs::read_to_string(path).map_err(|source| CliError::Input {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str::<AnnouncementRequest>(&contents)?
        }
        None => {
            let mut request = AnnouncementRequest::new(
                args.text.clone().unwrap_or_default(),
                &args.lang,
                args.gender,
            )
            .style(&args.style)
            .master(!args.no_master);
            request.custom_style = args.custom_style.clone();
            request.speaker = args.speaker;
            request
        }
    };

    // Flags add to what the request file asks for.
    request.formats.extend(args.formats.iter().cloned());
    request.keep_intermediate |= args.keep_wav;
    Ok(request)
}

async fn announce(config: &Config, args: &AnnounceArgs) -> Result<ExitCode, CliError> {
    let request = load_request(args)?;
    let voices_dir = voices_dir(config)?;

    let pipeline_config = PipelineConfig {
        voices_dir,
        output_dir: args
            .output_dir
            .clone()
            .unwrap_or_else(|| config.output.dir.clone()),
        engine: locate_engine(config.engine.binary.as_deref(), &config.engine.binaries_dir),
        ffmpeg: config.engine.ffmpeg.clone(),
    };
    let runner = Arc::new(TokioRunner::new(config.engine.timeout()));
    let mut pipeline = AnnouncementPipeline::new(pipeline_config, Catalog::builtin(), runner);

    if args.rewrite {
        let key = config
            .writer
            .api_key
            .clone()
            .ok_or(CliError::MissingApiKey)?;
        let writer = OpenAiWriter::new(key)?
            .with_base_url(&config.writer.base_url)
            .with_model(&config.writer.model);
        pipeline = pipeline.with_writer(Arc::new(writer));
    }

    let artifact = pipeline.run(&request).await?;
    println!("Announcement: {}", artifact.text);
    println!("Saved audio -> {}", artifact.primary.display());
    for export in &artifact.exports {
        if export.path != artifact.primary {
            println!("Exported {} -> {}", export.format, export.path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn config_or_default(path: &str, lenient: bool) -> Result<Config, config::ConfigError> {
    match config::load_config(Some(path)) {
        Ok(config) => Ok(config),
        Err(e) if lenient => {
            eprintln!("warning: {e}; using defaults");
            let mut config = Config::default();
            config::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            Ok(config)
        }
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let lenient = matches!(cli.command, Commands::Postinstall);

    let config = match config_or_default(&cli.config, lenient) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);
    tracing::debug!(
        path = %cli.config,
        found = Path::new(&cli.config).is_file(),
        "resolved configuration"
    );

    let flags = RuntimeFlags::from_env();
    let result = match &cli.command {
        Commands::Status => status(&config),
        Commands::Download { force, install } => download(&config, flags, *force, *install).await,
        Commands::DownloadBinaries {
            all_platforms,
            force,
        } => download_binaries(&config, flags, *all_platforms, *force).await,
        Commands::Postinstall => Ok(postinstall(&config, flags).await),
        Commands::Announce(args) => announce(&config, args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
