mod config;
mod demo;
mod error;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hosts::{HostKind, Settings};
use mcp::{ServerConfig, Session};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use config::Config;
use error::{Error, Result};

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Parser)]
#[command(name = "toolbox")]
#[command(about = "MCP tool hosts and a stdio client to drive them", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a toolbox.toml (default: ./toolbox.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve one host over stdin/stdout
    Serve {
        /// Host to serve (math, weather, wikipedia, arxiv, web-search)
        host: HostKind,
    },
    /// List the tools a server offers
    List {
        /// Built-in host name or a [servers.<name>] entry
        server: String,
    },
    /// Call one tool and print its text
    Call {
        /// Built-in host name or a [servers.<name>] entry
        server: String,
        /// Tool name
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
    /// Run scripted calls against hosts over stdio
    Demo {
        #[arg(default_values_t = [HostKind::Math, HostKind::Weather, HostKind::Wikipedia])]
        hosts: Vec<HostKind>,
    },
    /// Run the same scripted calls in-process, without a session
    Direct {
        #[arg(default_values_t = [HostKind::Math])]
        hosts: Vec<HostKind>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_logging();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries protocol frames under `serve`.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host } => cmd_serve(host).await,
        Commands::List { server } => {
            let config = Config::discover(cli.config.as_deref())?;
            cmd_list(&config, &server).await
        }
        Commands::Call { server, tool, args } => {
            let config = Config::discover(cli.config.as_deref())?;
            cmd_call(&config, &server, &tool, &args).await
        }
        Commands::Demo { hosts } => {
            let config = Config::discover(cli.config.as_deref())?;
            cmd_demo(&config, &hosts).await
        }
        Commands::Direct { hosts } => cmd_direct(&hosts).await,
    }
}

async fn cmd_serve(kind: HostKind) -> Result<()> {
    let host = kind.build(&Settings::from_env())?;
    tracing::info!(host = %kind, "serving on stdio");
    host.serve_stdio().await?;
    Ok(())
}

async fn cmd_list(config: &Config, server: &str) -> Result<()> {
    let session = open_session(config.server(server)?, config.timeout()).await?;
    let listed = session.list_tools().await;
    session.shutdown().await?;

    for tool in listed? {
        match tool.description {
            Some(description) => println!("{}: {description}", tool.name),
            None => println!("{}", tool.name),
        }
    }
    Ok(())
}

async fn cmd_call(config: &Config, server: &str, tool: &str, args: &str) -> Result<()> {
    let arguments = parse_arguments(args)?;
    let session = open_session(config.server(server)?, config.timeout()).await?;
    let called = session.call_tool_text(tool, Some(arguments)).await;
    session.shutdown().await?;

    println!("{}", called?);
    Ok(())
}

async fn cmd_demo(config: &Config, hosts: &[HostKind]) -> Result<()> {
    for &kind in hosts {
        if let Err(e) = demo_over_stdio(config, kind).await {
            println!("{kind} demo failed: {e}\n");
        }
    }
    Ok(())
}

async fn demo_over_stdio(config: &Config, kind: HostKind) -> Result<()> {
    let session = open_session(config.server(kind.name())?, config.timeout()).await?;
    let ran = demo::run(kind, &session).await;
    session.shutdown().await?;
    Ok(ran?)
}

async fn cmd_direct(hosts: &[HostKind]) -> Result<()> {
    let settings = Settings::from_env();
    for &kind in hosts {
        let outcome = match kind.registry(&settings) {
            Ok(registry) => demo::run(kind, &registry).await.map_err(Error::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = outcome {
            println!("{kind} demo failed: {e}\n");
        }
    }
    Ok(())
}

/// Spawn and initialize a session, closing it again if the handshake fails.
async fn open_session(server: ServerConfig, timeout: Duration) -> Result<Session> {
    let session = Session::spawn(server).await?.with_timeout(timeout);
    if let Err(e) = session.initialize().await {
        session.close().await.ok();
        return Err(e.into());
    }
    Ok(session)
}

fn parse_arguments(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::InvalidArguments("expected a JSON object".to_string())),
        Err(e) => Err(Error::InvalidArguments(e.to_string())),
    }
}
