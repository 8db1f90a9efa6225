// ABOUTME: Entry point for the kbox CLI application.
// ABOUTME: Parses arguments, loads configuration and dispatches to the engine.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use kbox::config::Config;
use kbox::context::Engine;
use kbox::engine::EngineError;
use kbox::error::{Error, Result};
use kbox::image::RawImage;
use kbox::output::{Output, OutputMode};
use kbox::runtime::{ContainerSpec, StartOptions};
use nonempty::NonEmpty;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    match run(cli.command, &mut output).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::debug!(kind = %e.kind(), "command failed");
            output.error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Dispatch one command; the returned value is the process exit code.
async fn run(command: Commands, output: &mut Output) -> Result<i32> {
    let cwd = env::current_dir()?;
    let engine = Engine::from_config(Config::discover(&cwd)?)?;
    let provider = engine.provider();

    match command {
        Commands::Up => {
            output.start_timer();
            let mut events = provider.events().subscribe();
            provider.up(&provider.up_options()).await?;
            output.lifecycle(&mut events);
            output.success("provider is up");
        }
        Commands::Down => {
            output.start_timer();
            let mut events = provider.events().subscribe();
            provider.down(&provider.down_options()).await?;
            output.lifecycle(&mut events);
            output.success("provider is down");
        }
        Commands::Status => {
            let status = if provider.is_up().await? { "up" } else { "down" };
            output.success(status);
        }
        Commands::Ip => {
            output.success(&provider.get_ip().await?.to_string());
        }
        Commands::Containers { app } => {
            let containers = engine.containers().await?.list(app.as_deref()).await?;
            output.data(&containers);
        }
        Commands::Info { container } => {
            let info = engine.containers().await?.info(&container).await?;
            match info {
                Some(info) => output.data(&info),
                None => return Err(Error::Engine(EngineError::NotFound(container))),
            }
        }
        Commands::Query { container, cmd } => {
            let cmd = NonEmpty::from_vec(cmd)
                .ok_or_else(|| Error::InvalidConfig("a command is required".to_string()))?;
            let stdout = engine.containers().await?.query_data(&container, cmd).await?;
            print!("{stdout}");
        }
        Commands::Shell { container } => {
            engine.containers().await?.terminal(&container).await?;
        }
        Commands::Image { name, build, src } => {
            output.start_timer();
            let raw = RawImage {
                build,
                src,
                ..RawImage::named(name)
            };
            let image = engine.images().await?.build(&raw).await?;
            output.success(&image.name);
        }
        Commands::Run { image, cmd } => {
            let manager = engine.containers().await?;
            let code = manager
                .run(&image, cmd, ContainerSpec::default(), StartOptions::default())
                .await?;
            return Ok(i32::try_from(code).unwrap_or(1));
        }
    }

    Ok(0)
}
