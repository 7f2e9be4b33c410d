use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;

use pdf_compress::backend;
use pdf_compress::cli::{is_pdf_path, Args};
use pdf_compress::config::Settings;
use pdf_compress::engine::{CompressRequest, Compressor, NullSink, ProgressSink};
use pdf_compress::report::{write_banner, write_batch_summary, write_summary};

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        return Ok(ExitCode::FAILURE);
    }

    let settings = Settings::default()
        .with_env()
        .context("Failed to read environment configuration")?
        .with_args(&args);
    settings.validate()?;

    let compressor = Compressor::new(backend::factory(
        settings.backend,
        settings.tool_overrides(),
    ));
    let print_line = |line: &str| println!("{}", line);
    let progress: &dyn ProgressSink = if settings.quiet { &NullSink } else { &print_line };

    let stdout = io::stdout();
    let mut succeeded = 0;
    let mut failed = 0;

    // One file at a time: each search completes before the next starts
    for input in &args.input {
        if !input.exists() {
            eprintln!("Error: File not found: {}", input.display());
            failed += 1;
            continue;
        }
        if !is_pdf_path(input) {
            eprintln!("Warning: Skipping non-PDF file: {}", input.display());
            continue;
        }

        let request = CompressRequest {
            input: input.clone(),
            output: args.output_for_run(),
            target_mb: settings.target_mb,
        };

        if !settings.quiet {
            write_banner(&mut stdout.lock())?;
        }
        let result = compressor.compress(&request, progress);
        write_summary(&mut stdout.lock(), &result)
            .with_context(|| format!("Failed to report result for {}", input.display()))?;

        if result.success {
            succeeded += 1;
        } else {
            failed += 1;
        }
    }

    if args.input.len() > 1 {
        write_batch_summary(&mut stdout.lock(), succeeded, failed)?;
    }
    stdout.lock().flush()?;

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
