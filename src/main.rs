use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use video_transcriber::config::{Config, CorrectionMode};
use video_transcriber::delivery::TRANSCRIPT_FILE_NAME;
use video_transcriber::TranscriptionPipeline;

fn cli() -> Command {
    Command::new("Video Transcriber")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Upload a video, extract its audio and get a corrected transcript")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("transcribe")
                .about("Transcribe a local video file")
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .value_name("FILE")
                        .help("Video file (mp4, avi, mov or mkv)")
                        .required(true),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Where to write the transcript")
                        .default_value(TRANSCRIPT_FILE_NAME),
                )
                .arg(
                    Arg::new("language")
                        .short('l')
                        .long("language")
                        .value_name("TAG")
                        .help("Language tag, e.g. en-GB"),
                )
                .arg(
                    Arg::new("no-correction")
                        .long("no-correction")
                        .help("Skip the spelling correction pass")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve the upload page and HTTP API")
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_name("HOST")
                        .help("Address to bind"),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .help("Port to listen on")
                        .value_parser(clap::value_parser!(u16)),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose");

    // Logging is configured from the config file, so load it first and
    // report any problem once the subscriber is up.
    let (config, load_error) = match matches.get_one::<String>("config") {
        Some(path) => (
            Config::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path))?
                .with_env_overrides(),
            None,
        ),
        None => match Config::load() {
            Ok(config) => (config.with_env_overrides(), None),
            Err(e) => (Config::from_env(), Some(e)),
        },
    };

    init_logging(&config, verbose);

    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {}", e);
    }

    config.validate()?;
    info!("{}", config.summary());

    match matches.subcommand() {
        Some(("transcribe", sub)) => transcribe(config, sub).await,
        Some(("serve", sub)) => serve(config, sub).await,
        _ => unreachable!("subcommand_required is set"),
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("video_transcriber=debug,info")
    } else {
        EnvFilter::new(&config.logging.level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .init();

    if verbose {
        info!("Verbose logging enabled");
    }
}

async fn transcribe(mut config: Config, matches: &ArgMatches) -> Result<()> {
    let input = PathBuf::from(
        matches
            .get_one::<String>("input")
            .context("--input is required")?,
    );
    let output = PathBuf::from(
        matches
            .get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or(TRANSCRIPT_FILE_NAME),
    );
    let language = matches.get_one::<String>("language").cloned();

    if matches.get_flag("no-correction") {
        config.correction.mode = CorrectionMode::None;
    }

    info!("🚀 Video Transcriber starting...");
    info!("📁 Input: {}", input.display());

    let bytes = tokio::fs::read(&input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let extension = input
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();

    let pipeline = TranscriptionPipeline::from_config(config)?;

    match pipeline.transcribe(bytes, &extension, language.as_deref()).await {
        Ok(transcript) => {
            transcript.artifact().write_to(&output).await?;
            println!("{}", transcript.text);
            Ok(())
        }
        Err(e) => {
            error!("❌ {}", e);
            anyhow::bail!("{}", e.user_message())
        }
    }
}

#[cfg(feature = "api")]
async fn serve(mut config: Config, matches: &ArgMatches) -> Result<()> {
    use std::sync::Arc;
    use video_transcriber::api::ApiServer;

    if let Some(host) = matches.get_one::<String>("host") {
        config.server.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    let host = config.server.host.clone();
    let port = config.server.port;
    let pipeline = Arc::new(TranscriptionPipeline::from_config(config)?);

    ApiServer::new(pipeline, host, port).start().await
}

#[cfg(not(feature = "api"))]
async fn serve(_config: Config, _matches: &ArgMatches) -> Result<()> {
    anyhow::bail!("this build does not include the HTTP server; rebuild with --features api")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn test_transcribe_args() {
        let matches = cli()
            .try_get_matches_from([
                "video-transcriber",
                "-v",
                "transcribe",
                "--input",
                "talk.mkv",
                "--language",
                "de-DE",
                "--no-correction",
            ])
            .unwrap();
        assert!(matches.get_flag("verbose"));
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "transcribe");
        assert_eq!(sub.get_one::<String>("output").unwrap(), "transcription.txt");
        assert!(sub.get_flag("no-correction"));
    }

    #[test]
    fn test_serve_rejects_bad_port() {
        assert!(cli()
            .try_get_matches_from(["video-transcriber", "serve", "--port", "http"])
            .is_err());
    }
}
