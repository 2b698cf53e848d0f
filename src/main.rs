//! CLI entry point for the Doubao MCP server.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use dotenvy::dotenv;
use serde_json::json;
use tokio::io::BufReader;

mod capabilities;
mod client;
mod config;
mod error;
mod logging;
mod mcp;
mod modules;
mod palette;
mod smoke;
mod tools;
mod ui;
mod utils;

use crate::config::Config;
use crate::tools::{ToolContext, ToolRegistryBuilder};

#[derive(Parser, Debug)]
#[command(
    name = "doubao-mcp",
    author,
    version,
    about = "MCP server for Doubao (Ark) image and video generation",
    long_about = "MCP server for Doubao (Ark) image and video generation.\n\n\
    Speaks line-delimited JSON-RPC on stdin/stdout. Configure with ARK_API_KEY\n\
    or ~/.doubao-mcp/config.toml.",
    after_help = "Examples:\
    \\n   doubao-mcp                     # Serve MCP over stdio\
    \\n   doubao-mcp tools               # Print tool descriptors\
    \\n   doubao-mcp query cgt-2025...   # Inspect a video task\
    \\n   doubao-mcp smoke --confirm     # Generate real media (billable)"
)]
struct Cli {
    /// Subcommand to run (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Config profile name
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Enable verbose logging (stderr)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Serve MCP over stdio
    Serve,
    /// Print the tool descriptors advertised by `tools/list`
    Tools,
    /// Print the known model capability matrix
    Models,
    /// Fetch the current state of a video generation task
    Query {
        /// Task id returned by `generate_video`
        task_id: String,
    },
    /// Smoke test image and video generation (writes real files)
    Smoke {
        /// Confirm you want to spend credits and write files
        #[arg(long)]
        confirm: bool,
        /// Output directory for generated files (default: configured output_dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Prompt for image generation
        #[arg(
            long,
            default_value = "A friendly robot playing a golden trumpet, colorful illustration"
        )]
        image_prompt: String,
        /// Image model (default: configured image model)
        #[arg(long)]
        image_model: Option<String>,
        /// Prompt for video generation
        #[arg(
            long,
            default_value = "A cinematic slow pan across a cozy coffee shop interior, warm lighting, rain outside the window"
        )]
        video_prompt: String,
        /// Video model (default: configured video model)
        #[arg(long)]
        video_model: Option<String>,
        /// Submit video generation without waiting/downloading
        #[arg(long)]
        video_async: bool,
        /// Skip image generation
        #[arg(long)]
        skip_image: bool,
        /// Skip video generation
        #[arg(long)]
        skip_video: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();
    logging::set_verbose(cli.verbose);

    if let Err(err) = run(cli).await {
        logging::error(format!("{err:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command.clone().unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(&cli).await,
        Commands::Tools => print_tools(),
        Commands::Models => {
            println!(
                "{}",
                serde_json::to_string_pretty(capabilities::MODELS)?
            );
            Ok(())
        }
        Commands::Query { task_id } => {
            let config = load_config_from_cli(&cli)?;
            let client = client::ArkClient::new(&config)?;
            let record = modules::video::query_task(&client, &task_id).await?;
            let output = tools::media::task_record_json(record)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Commands::Smoke {
            confirm,
            output_dir,
            image_prompt,
            image_model,
            video_prompt,
            video_model,
            video_async,
            skip_image,
            skip_video,
        } => {
            if !confirm {
                anyhow::bail!(
                    "Refusing to run: this command makes paid network calls and writes files. Re-run with --confirm."
                );
            }

            let config = load_config_from_cli(&cli)?;
            smoke::run_smoke_media(
                &config,
                smoke::SmokeMediaOptions {
                    output_dir: output_dir.unwrap_or_else(|| config.output_dir()),
                    image_prompt,
                    image_model: image_model.unwrap_or_else(|| config.image_model()),
                    video_prompt,
                    video_model: video_model.unwrap_or_else(|| config.video_model()),
                    poll: config.poll_config(),
                    video_async,
                    skip_image,
                    skip_video,
                },
            )
            .await
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    }
}

async fn run_server(cli: &Cli) -> Result<()> {
    let config = load_config_from_cli(cli)?;
    let context = ToolContext::from_config(&config)?;
    let registry = ToolRegistryBuilder::new()
        .with_media_tools()
        .build(context);

    logging::info(format!(
        "{} ready with tools: {}",
        mcp::SERVER_NAME,
        registry.names().join(", ")
    ));

    let server = mcp::McpServer::new(registry);
    let mut stdout = tokio::io::stdout();
    server
        .serve(BufReader::new(tokio::io::stdin()), &mut stdout)
        .await
}

fn print_tools() -> Result<()> {
    let descriptors = tools::media::media_tools()
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name(),
                "description": tool.description(),
                "capabilities": tool.capabilities(),
                "inputSchema": tool.input_schema(),
            })
        })
        .collect::<Vec<_>>();
    println!("{}", serde_json::to_string_pretty(&descriptors)?);
    Ok(())
}

fn load_config_from_cli(cli: &Cli) -> Result<Config> {
    let profile = cli
        .profile
        .clone()
        .or_else(|| std::env::var("DOUBAO_MCP_PROFILE").ok());
    let config = Config::load(cli.config.clone(), profile.as_deref())?;
    if config.verbose() {
        logging::set_verbose(true);
    }
    Ok(config)
}

/// Generate shell completions for the given shell
fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["doubao-mcp"]).expect("parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn smoke_requires_explicit_flags_to_parse() {
        let cli = Cli::try_parse_from(["doubao-mcp", "smoke", "--confirm", "--skip-video"])
            .expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Smoke {
                confirm: true,
                skip_video: true,
                ..
            })
        ));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
