#![forbid(unsafe_code)]

//! `adom-run`: run a single agent turn from the command line.
//!
//! Prints the final response, or with `--stream` every event as one JSON
//! line. Exits non-zero when the turn fails.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use futures_util::StreamExt;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use adom_sdk::{
    Adom, ApprovalMode, ClientConfig, ReasoningEffort, Result, SandboxMode, SdkError,
    ThreadEvent, ThreadOptions, TurnOptions,
};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "adom-run", about = "Run one turn against the adom agent", version, long_about = None)]
struct Cli {
    /// Path to a TOML client configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Agent executable; overrides the config file and `ADOM_EXECUTABLE`.
    #[arg(long)]
    executable: Option<PathBuf>,

    /// Resume an existing thread instead of starting a new one.
    #[arg(long, value_name = "THREAD_ID")]
    resume: Option<String>,

    /// JSON Schema file the final response must conform to.
    #[arg(long, value_name = "FILE")]
    output_schema: Option<PathBuf>,

    /// Sandbox mode for this turn.
    #[arg(long, value_enum)]
    sandbox: Option<SandboxMode>,

    /// Approval mode for this turn.
    #[arg(long, value_enum)]
    approval: Option<ApprovalMode>,

    /// Reasoning effort for this turn.
    #[arg(long, value_enum)]
    effort: Option<ReasoningEffort>,

    /// Abort the turn after this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print every event as a JSON line instead of only the final response.
    #[arg(long)]
    stream: bool,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Prompt sent to the agent.
    prompt: String,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| SdkError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
        .inspect_err(|err| error!(%err, "turn failed"))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load_from_path(path)?,
        None => ClientConfig::default(),
    };
    if let Some(executable) = args.executable.clone() {
        config = config.with_executable_path(executable);
    }

    let client = Adom::new(config)?;
    info!(executable = %client.executable().display(), "client ready");

    let thread = match args.resume.clone() {
        Some(id) => client.resume_thread(id, ThreadOptions::default())?,
        None => client.start_thread(ThreadOptions::default()),
    };
    let options = turn_options(&args)?;

    if args.stream {
        let mut events = thread.run_streamed(args.prompt, options).await?;
        while let Some(event) = events.next().await {
            let event = event?;
            println!("{}", serde_json::to_string(&event)?);
            match event {
                ThreadEvent::TurnFailed(ev) => return Err(SdkError::TurnFailed(ev.error.message)),
                ThreadEvent::ThreadError(ev) => return Err(SdkError::ThreadRuntime(ev.message)),
                _ => {}
            }
        }
    } else {
        let result = thread.run(args.prompt, options).await?;
        info!(
            thread_id = result.thread_id.as_deref(),
            input_tokens = result.usage.input_tokens,
            output_tokens = result.usage.output_tokens,
            "turn completed"
        );
        println!("{}", result.final_response);
    }

    Ok(())
}

fn turn_options(args: &Cli) -> Result<TurnOptions> {
    let mut options = TurnOptions {
        approval_mode: args.approval,
        sandbox_mode: args.sandbox,
        reasoning_effort: args.effort,
        timeout_ms: args.timeout_ms,
        ..TurnOptions::default()
    };

    if let Some(path) = &args.output_schema {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SdkError::InvalidOptions(format!("cannot read {}: {err}", path.display()))
        })?;
        let schema = serde_json::from_str(&raw).map_err(|err| {
            SdkError::InvalidOptions(format!("{} is not JSON: {err}", path.display()))
        })?;
        options = options.with_output_schema(schema);
    }

    options.validate()?;
    Ok(options)
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| SdkError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| SdkError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
