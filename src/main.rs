//! shortgen command line
//!
//! Reads a topic, runs the pipeline once and exits with the outcome's code.

use clap::Parser;
use shortgen::{Config, Error, Event, Failure, Pipeline, PipelineMode, PipelineStage, Topic};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shortgen")]
#[command(about = "Generate a narrated short video from a topic")]
#[command(version)]
struct Args {
    /// Topic of the video (prompted for interactively when omitted)
    #[arg(short, long)]
    topic: Option<String>,

    /// Directory for intermediate files
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Final video path (relative paths resolve against the work dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Speech voice identifier
    #[arg(long)]
    voice_id: Option<String>,

    /// Seconds between video status polls (default: 10)
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Give up on the video task after this many seconds (default: 1800)
    #[arg(long)]
    max_wait_secs: Option<u64>,

    /// Run voiceover and video generation one after another
    #[arg(long)]
    sequential: bool,

    /// Keep intermediate files in a per-run subdirectory
    #[arg(long)]
    namespace: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.work_dir {
            config.artifacts.work_dir = dir.clone();
        }
        if let Some(output) = &self.output {
            config.artifacts.output_file = output.clone();
        }
        if let Some(voice_id) = &self.voice_id {
            config.voice.voice_id = voice_id.clone();
        }
        if let Some(secs) = self.poll_interval_secs {
            config.video.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.max_wait_secs {
            config.video.max_wait = Duration::from_secs(secs);
        }
        if self.sequential {
            config.mode = PipelineMode::Sequential;
        }
        if self.namespace {
            config.artifacts.namespace_by_job = true;
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let code = match run(&args).await {
        Ok(code) => code,
        Err(failure) => {
            eprintln!("Error: {failure}");
            failure.exit_code
        }
    };
    std::process::exit(code);
}

async fn run(args: &Args) -> Result<i32, Failure> {
    let setup = |e: Error| Failure::new(PipelineStage::Setup, &e);

    let mut config = Config::from_env().map_err(setup)?;
    args.apply(&mut config);
    config.validate().map_err(setup)?;

    let topic = match &args.topic {
        Some(topic) => Topic::new(topic.clone()),
        None => prompt_for_topic().await,
    }
    .map_err(setup)?;

    let pipeline = Pipeline::new(config).map_err(setup)?;
    let printer = tokio::spawn(print_progress(pipeline.subscribe()));
    tokio::spawn(shortgen::cancel_on_signal(pipeline.cancellation_token()));

    let outcome = pipeline.run_to_outcome(&topic).await;

    // dropping the pipeline closes the event channel and ends the printer
    drop(pipeline);
    printer.await.ok();
    Ok(outcome.exit_code())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "shortgen=debug" } else { "shortgen=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn prompt_for_topic() -> shortgen::Result<Topic> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Enter today's topic of interest: ").await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Topic::new(line)
}

async fn print_progress(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                println!("{}", describe(&event));
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "progress printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe(event: &Event) -> String {
    match event {
        Event::ScriptGenerated { path, .. } => {
            format!("New script generated and saved to {}", path.display())
        }
        Event::SynthesizingVoiceover { script } => {
            format!("Generating voiceover for script:\n{script}")
        }
        Event::VoiceoverSynthesized { path, .. } => {
            format!("Voiceover generated successfully: {}", path.display())
        }
        Event::VideoSubmitted { task_id } => {
            format!("Video generation task submitted successfully, task ID: {task_id}")
        }
        Event::VideoStatus { status, .. } => format!("Video status: {status}"),
        Event::VideoReady { download_url } => format!("Video download link: {download_url}"),
        Event::VideoDownloaded { path, .. } => {
            format!("Video downloaded successfully to {}", path.display())
        }
        Event::Muxed { path } => format!("Final video saved as {}", path.display()),
        Event::CleanupComplete { .. } => "Temporary files deleted.".to_string(),
        Event::Completed { .. } => "Video generation complete!".to_string(),
        Event::Failed { failure } => format!("Error: {failure}"),
    }
}
