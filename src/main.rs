use clap::Parser;
use colored::*;
use sdxbook::{Renderer, StyleOverride};
use std::process;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sdxbook")]
#[command(about = "Turn the Software Design by Example websites into bookmarked PDF books")]
#[command(version)]
struct Args {}

#[tokio::main]
async fn main() {
    // Set up logging with chromiumoxide errors suppressed
    let filter = EnvFilter::from_default_env()
        .add_directive("chromiumoxide::conn=off".parse().unwrap())
        .add_directive("chromiumoxide::handler=off".parse().unwrap())
        .add_directive("sdxbook=info".parse().unwrap());

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let _args = Args::parse();

    // The style override lives for the whole run and is removed when this
    // block is left, on success and on the startup-failure path alike.
    let result = async {
        let style = StyleOverride::create()?;
        let renderer = Renderer::launch(&style).await?;

        sdxbook::run(&renderer).await;

        renderer.close().await;
        anyhow::Ok(())
    }
    .await;

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }

    info!("PDF generation completed");
}
