use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kotoba_gateway::api::ApiServer;
use kotoba_gateway::llm::DIAGNOSTIC_PROMPT;
use kotoba_gateway::voice::{SynthesisRequest, VoicevoxClient};
use kotoba_gateway::{Config, GeminiClient};

/// Kotoba - voice chat gateway
#[derive(Parser)]
#[command(name = "kotoba", version, about)]
struct Cli {
    /// Port to listen on (overrides KOTOBA_PORT/PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send one message through the chat backend and print the reply
    Chat {
        /// Message to send
        message: String,
    },
    /// Fire the fixed diagnostic prompt against the chat backend
    Diag,
    /// List available synthesis speakers
    Speakers {
        /// API key (falls back to VOICEVOX_API_KEY)
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Synthesize text to an audio file
    Synth {
        /// Text to synthesize
        text: String,
        /// Output file path
        #[arg(short, long, default_value = "voice.wav")]
        output: PathBuf,
        /// Speaker ID
        #[arg(short, long)]
        speaker: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,kotoba_gateway=info",
        1 => "info,kotoba_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Chat { message } => cmd_chat(&config, &message).await,
            Command::Diag => cmd_chat(&config, DIAGNOSTIC_PROMPT).await,
            Command::Speakers { key } => cmd_speakers(&config, key).await,
            Command::Synth {
                text,
                output,
                speaker,
            } => cmd_synth(&config, &text, &output, speaker).await,
        };
    }

    tracing::info!(port = config.port, "starting kotoba gateway");

    let server = ApiServer::from_config(&config)?;
    server.run().await?;

    Ok(())
}

/// One-shot chat round trip
async fn cmd_chat(config: &Config, message: &str) -> anyhow::Result<()> {
    let key = config
        .api_keys
        .gemini
        .clone()
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not set"))?;

    let client = GeminiClient::new(key, config.gemini_model.clone())?;

    println!("Sending: \"{message}\"");
    let reply = client.generate(message).await?;
    println!("{reply}");

    Ok(())
}

/// Print the upstream speaker list
async fn cmd_speakers(config: &Config, key: Option<String>) -> anyhow::Result<()> {
    let client = VoicevoxClient::new(config.voicevox_url.clone());
    let key = key.or_else(|| config.api_keys.voicevox.clone());

    let speakers = client.speakers(key.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&speakers)?);

    Ok(())
}

/// Synthesize text and write the audio to a file
async fn cmd_synth(
    config: &Config,
    text: &str,
    output: &std::path::Path,
    speaker: Option<u32>,
) -> anyhow::Result<()> {
    let key = config
        .api_keys
        .voicevox
        .clone()
        .ok_or_else(|| anyhow::anyhow!("VOICEVOX_API_KEY is not set"))?;

    let client = VoicevoxClient::new(config.voicevox_url.clone());
    let request = SynthesisRequest {
        text: text.to_string(),
        speaker: speaker.unwrap_or(config.synthesis.speaker),
        pitch: config.synthesis.pitch,
        intonation_scale: config.synthesis.intonation_scale,
        speed: config.synthesis.speed,
    };

    println!("Synthesizing \"{text}\"...");
    let audio = client.synthesize(&key, &request).await?;
    std::fs::write(output, &audio.bytes)?;
    println!(
        "Wrote {} bytes ({}) to {}",
        audio.bytes.len(),
        audio.content_type,
        output.display()
    );

    Ok(())
}
