use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use moviebot::chat;
use moviebot::config::Settings;
use moviebot::constants;
use moviebot::prompt::PromptTemplate;
use moviebot::speech::{AudioClip, SpeechToText};
use moviebot::web_server;

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Movie dataset (CSV with Title, Genre and Rating columns).
    #[arg(long, global = true, env = "MOVIEBOT_DATA")]
    data: Option<PathBuf>,

    /// Base URL of the Ollama-compatible text generation service.
    #[arg(long, global = true, env = "OLLAMA_URL")]
    ollama_url: Option<String>,

    /// Model name passed to the text generation service.
    #[arg(long, global = true, env = "MOVIEBOT_MODEL")]
    model: Option<String>,

    /// Speech-to-text endpoint receiving multipart audio uploads.
    #[arg(long, global = true, env = "MOVIEBOT_STT_URL")]
    stt_url: Option<String>,

    /// Prompt used when the dataset has no match: "question" or "genre-listing".
    #[arg(long, global = true, default_value_t = PromptTemplate::Question)]
    prompt_template: PromptTemplate,

    /// Directory holding the page templates.
    #[arg(long, global = true, env = "MOVIEBOT_TEMPLATES")]
    templates: Option<PathBuf>,

    /// Give up on a text generation request after this many seconds.
    #[arg(long, global = true)]
    llm_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the web UI.
    Serve {
        #[arg(long, default_value_t = constants::DEFAULT_PORT, help = "Port for the web server.")]
        port: u16,
    },
    /// Answer a single query and exit.
    Ask {
        /// Genre or free-text question.
        query: String,
    },
    /// Transcribe a recorded audio file and answer what was said.
    Voice {
        /// Audio file to transcribe.
        file: PathBuf,
    },
    /// Answer queries typed on stdin, one per line.
    Chat,
}

impl Cli {
    fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        if let Some(data) = &self.data {
            settings.data_path = data.clone();
        }
        if let Some(url) = &self.ollama_url {
            settings.ollama_url = url.clone();
        }
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(url) = &self.stt_url {
            settings.stt_url = url.clone();
        }
        if let Some(dir) = &self.templates {
            settings.templates_dir = dir.clone();
        }
        settings.prompt_template = self.prompt_template;
        settings.llm_timeout = self.llm_timeout_secs.map(Duration::from_secs);
        settings
    }
}

// The main entry point of the application, using tokio's async runtime
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for service URLs and model names)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,moviebot=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();

    info!("moviebot starting with command: {:?}", cli.command);

    match cli.command {
        Commands::Serve { port } => {
            info!("Starting web UI on port {}...", port);
            // Dataset and port errors end the process here with a non-zero exit.
            let server = web_server::bind_web_server(port, &settings)
                .await
                .context("Failed to start web server")?;
            let mut web_server_handle = tokio::spawn(server.run());

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(Ok(())) => info!("Web server task completed unexpectedly."),
                        Ok(Err(e)) => return Err(e),
                        Err(e) if e.is_panic() => anyhow::bail!("Web server task panicked: {:?}", e),
                        Err(e) => anyhow::bail!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Ask { query } => {
            let query = query.trim();
            if query.is_empty() {
                anyhow::bail!("query must not be empty");
            }
            let resolver = settings.build_resolver()?;
            let resolution = resolver
                .resolve(query)
                .await
                .context("Failed to generate an answer")?;
            chat::print_resolution(&mut std::io::stdout(), &resolution)?;
        }
        Commands::Voice { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read audio file {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "recording.wav".to_string());
            let clip = AudioClip::from_file_name(bytes, file_name);

            let text = match settings.transcriber().transcribe(&clip).await {
                Ok(text) => text,
                Err(e) => {
                    error!("Transcription failed: {:?}", e);
                    anyhow::bail!("{}", e.user_message());
                }
            };
            println!("You said: {}", text);

            let resolver = settings.build_resolver()?;
            let resolution = resolver
                .resolve(&text)
                .await
                .context("Failed to generate an answer")?;
            chat::print_resolution(&mut std::io::stdout(), &resolution)?;
        }
        Commands::Chat => {
            let resolver = settings.build_resolver()?;
            let stdin = std::io::stdin();
            chat::run_chat(&resolver, stdin.lock(), std::io::stdout())
                .await
                .context("Chat session failed")?;
        }
    }

    Ok(())
}
