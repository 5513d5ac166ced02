use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde_sarif::sarif::Invocation;

use nanoscope::engine::build_context;
use nanoscope::pattern::PatternInfo;
use nanoscope::report::{build_sarif, render_forests};
use nanoscope::scan::scan_inputs;

/// CLI arguments for nanoscope execution.
#[derive(Parser, Debug)]
#[command(
    name = "nanoscope",
    about = "Expression trees and nanopatterns for JVM class files and JAR files.",
    version
)]
struct Cli {
    #[arg(long, value_name = "PATH", required_unless_present = "list_patterns")]
    input: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Write expression-forest outlines instead of SARIF.
    #[arg(long)]
    trees: bool,
    /// Write the pattern catalog as JSON and exit.
    #[arg(long)]
    list_patterns: bool,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    timing: bool,
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("nanoscope", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if cli.list_patterns {
        let mut writer = output_writer(cli.output.as_deref())?;
        let context = build_context(Vec::new());
        let infos: Vec<&PatternInfo> = context.catalog().infos().collect();
        serde_json::to_writer_pretty(&mut writer, &infos)
            .context("failed to serialize pattern catalog")?;
        writer.write_all(b"\n").context("failed to write output")?;
        return Ok(());
    }

    let Some(input) = cli.input.as_deref() else {
        anyhow::bail!("--input is required");
    };
    if !input.exists() {
        anyhow::bail!("input not found: {}", input.display());
    }

    let started_at = Instant::now();
    let scan = scan_inputs(input)?;
    let class_count = scan.class_count;
    let context = build_context(scan.classes);
    let method_count = context.method_count();

    let mut writer = output_writer(cli.output.as_deref())?;

    if cli.trees {
        writer
            .write_all(render_forests(&context).as_bytes())
            .context("failed to write expression trees")?;
    } else {
        let sarif = build_sarif(&context, scan.artifacts, build_invocation());
        serde_json::to_writer_pretty(&mut writer, &sarif)
            .context("failed to serialize SARIF output")?;
        writer
            .write_all(b"\n")
            .context("failed to write SARIF output")?;
    }
    writer.flush().context("failed to flush output")?;

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} classes={} methods={}",
            started_at.elapsed().as_millis(),
            class_count,
            method_count
        );
    }

    Ok(())
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}

fn build_invocation() -> Invocation {
    let arguments: Vec<String> = std::env::args().collect();
    let command_line = arguments.join(" ");

    Invocation::builder()
        .execution_successful(true)
        .arguments(arguments)
        .command_line(command_line)
        .build()
}
