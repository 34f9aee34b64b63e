use std::process::ExitCode;
use std::thread;

use anyhow::{Context, Result};
use passconfig::ConfigError;
use renderer::{ErrorKind, StopHandle};
use tracing_subscriber::EnvFilter;

use crate::bootstrap::{build_plan, load_config, RunPlan};
use crate::cli::{Cli, Command, RunArgs, SourceArgs};
use crate::paths::AppPaths;

/// Exit status for bad configuration: unreadable or invalid files, missing
/// GL context or extensions, malformed pass lists.
const EXIT_CONFIGURATION: u8 = 2;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(config = %paths.config_dir().display(), "resolved backdrop paths");

    match &cli.command {
        Some(Command::Check(source)) => check(source, &paths),
        None => run_window(&cli.run, &paths),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn prepare(source: &SourceArgs, args: &RunArgs, paths: &AppPaths) -> Result<RunPlan> {
    let (config, base_dir, origin) = load_config(source, paths)?;
    build_plan(&config, &base_dir, origin, args)
}

fn check(source: &SourceArgs, paths: &AppPaths) -> Result<()> {
    let plan = prepare(source, &RunArgs::default(), paths)?;
    plan.uniform_tables()?;

    match &plan.origin {
        Some(path) => println!("config: {}", path.display()),
        None => println!("config: (shader list)"),
    }
    let total = plan.passes.len();
    for (index, pass) in plan.passes.iter().enumerate() {
        let role = if index + 1 == total { "direct" } else { "buffered" };
        println!(
            "pass {}/{total} '{}' {role} {} ({} bytes)",
            index + 1,
            pass.id,
            pass.shader.display(),
            pass.source.len()
        );
        if !pass.uniforms.is_empty() {
            let names: Vec<_> = pass.uniforms.keys().map(String::as_str).collect();
            println!("  uniforms: {}", names.join(", "));
        }
        for (sampler, source) in &pass.textures {
            println!("  texture: {sampler} <- {source}");
        }
    }
    let (width, height) = plan.window.size;
    println!(
        "window: {width}x{height} tier={:?} vsync={}",
        plan.window.tier, plan.window.vsync
    );
    if let Some(duration) = plan.duration {
        println!("duration: {}", humantime::format_duration(duration));
    }
    Ok(())
}

fn run_window(args: &RunArgs, paths: &AppPaths) -> Result<()> {
    let plan = prepare(&args.source, args, paths)?;
    let uniforms = plan.uniform_tables()?;
    let sources = plan.sources();

    let stop = StopHandle::new();
    if let Some(duration) = plan.duration {
        let timer = stop.clone();
        thread::Builder::new()
            .name("backdrop-timer".into())
            .spawn(move || {
                thread::sleep(duration);
                tracing::info!(
                    duration = %humantime::format_duration(duration),
                    "run duration elapsed; stopping"
                );
                timer.stop();
            })
            .context("failed to spawn run timer")?;
    }

    tracing::info!(
        passes = sources.len(),
        width = plan.window.size.0,
        height = plan.window.size.1,
        tier = ?plan.window.tier,
        "starting backdrop"
    );
    renderer::window::run(plan.window, sources, uniforms, stop)
}

pub fn exit_code(err: &anyhow::Error) -> ExitCode {
    let configuration = err.chain().any(|cause| {
        cause.downcast_ref::<ConfigError>().is_some()
            || cause
                .downcast_ref::<renderer::Error>()
                .is_some_and(|err| err.kind() == ErrorKind::Configuration)
    });
    if configuration {
        ExitCode::from(EXIT_CONFIGURATION)
    } else {
        ExitCode::FAILURE
    }
}
