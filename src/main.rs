//! docpipe's main application entry point.
//! Parses the command line, loads the configuration once and dispatches to
//! the requested pipeline stage.

use anyhow::{bail, Context};
use docpipe::{
    cli::{get_args, Args, Command},
    config::{load_config, resolve_host, Config},
    converter::conversion_task,
    error::default_error_handler,
    filler::Filler,
    logger::init_logger,
    preview,
    renderer::MiniJinjaRenderer,
    server,
    store::DocumentStore,
};

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

fn convert(config: &Config) -> anyhow::Result<()> {
    let report = conversion_task(config);
    println!(
        "Converted {} of {} documents.",
        report.converted.len(),
        config.rules.len()
    );
    if !report.is_success() {
        bail!("{} conversion rule(s) failed", report.failed.len());
    }
    Ok(())
}

fn fill(config: &Config) -> anyhow::Result<()> {
    let renderer = MiniJinjaRenderer::with_policy(config.fill.unresolved);
    let report = Filler::new(config, &renderer).run();
    println!("Filled {} of {} documents.", report.filled.len(), config.fills.len());
    if !report.is_success() {
        bail!("{} fill job(s) failed", report.failed.len());
    }
    Ok(())
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")
}

/// Main application logic execution.
///
/// # Flow
/// 1. Loads and validates the configuration (errors abort)
/// 2. Runs the selected stage; batch stages process every rule or job and
///    fail at the end if any of them failed
fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref()).context("failed to load configuration")?;

    match args.command {
        Command::Convert => convert(&config),
        Command::Fill => fill(&config),
        Command::Run => {
            let converted = convert(&config);
            let filled = fill(&config);
            converted.and(filled)
        }
        Command::Serve { host, port } => {
            let host = resolve_host(host.as_deref().or(config.server.host.as_deref()));
            let port = port.unwrap_or(config.server.port);
            let store = DocumentStore::new(&config.data_dir);
            runtime()?.block_on(server::serve(
                store,
                config.server.section_groups.clone(),
                &host,
                port,
            ))?;
            Ok(())
        }
        Command::Preview { host, port } => {
            let host = resolve_host(host.as_deref().or(config.preview.host.as_deref()));
            let port = port.unwrap_or(config.preview.port);
            runtime()?.block_on(preview::serve(
                config.markdown_dir.clone(),
                &config.preview.ignore,
                &host,
                port,
            ))?;
            Ok(())
        }
    }
}
