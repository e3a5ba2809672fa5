mod app;
mod cli;

use clap::Parser;
use cli::{Cli, Command, ModelsArgs, RunArgs};
use kite_core::config::Config;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or_else(|| Command::Run(RunArgs::default()));

    match command {
        Command::Run(args) => cmd_run(args),
        Command::Models(args) => cmd_models(args),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    // Peek at config for file logging before the subscriber exists
    let (to_file, log_dir) = Config::load(&args.config)
        .map(|c| (c.logging_to_file, c.log_dir))
        .unwrap_or((false, None));
    let _guard =
        kite_core::lifecycle::logging::init_logging(&args.log_level, to_file, log_dir.as_deref());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let application = app::Application::build(&args)?;
        application.serve().await
    })
}

fn cmd_models(args: ModelsArgs) -> anyhow::Result<()> {
    let _guard = kite_core::lifecycle::logging::init_logging("warn", false, None);

    let config = Config::load(&args.config).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from '{}': {e}, using defaults", args.config);
        Config::default()
    });
    let providers =
        kite_provider::build_providers(&config, Arc::new(kite_core::metrics::Metrics::new()))?;
    let registry = &providers.registry;

    println!("default model: {}", registry.default_model());
    println!(
        "gemini key: {}",
        if registry.credential_present() { "present" } else { "missing" }
    );
    for route in registry.routes() {
        println!();
        match route.fallback_model {
            Some(ref fallback) => println!("{} (falls back to {fallback})", route.name),
            None => println!("{}", route.name),
        }
        for upstream in &route.upstreams {
            match upstream.endpoint() {
                Some(url) => println!("  - {} {url}", upstream.name()),
                None => println!("  - {}", upstream.name()),
            }
        }
        for skipped in &route.skipped {
            println!("  - {skipped} (skipped: no credential)");
        }
    }
    println!();
    println!("{} (image)", providers.image.model_name());
    Ok(())
}
