//! Dupe Detective: find byte-for-byte identical files and delete redundant
//! copies safely.
//!
//! The engine lives in [`scanner`] (walking and hashing), [`duplicates`]
//! (grouping and the concurrent scan coordinator) and [`actions`]
//! (validated deletion). [`run_app`] wires them to the command line.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use bytesize::ByteSize;

use crate::actions::{execute_plan, DeleteProgressCallback, DeletionPlan, DeletionPlanner, DeletionReport};
use crate::cli::{Cli, Commands, DeleteArgs, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::duplicates::{start_scan, ScanHandle, ScanResult};
use crate::error::ExitCode;
use crate::output::{write_json, JsonDeletion, JsonReport, TextReport};
use crate::progress::{progress_channel, DeletionProgressBar, ProgressReporter, DEFAULT_PROGRESS_CAPACITY};
use crate::scanner::WalkerConfig;

/// Run the command described by `cli` and return the process exit code.
///
/// # Errors
///
/// Returns an error for fatal failures: invalid configuration, an invalid
/// scan root, a cancelled scan, or unwritable output.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color);

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load(None),
    };
    let ui = Ui {
        quiet: cli.quiet,
        color: !cli.no_color && io::stdout().is_terminal(),
        progress: !cli.quiet && io::stderr().is_terminal(),
    };

    match cli.command {
        Commands::Scan(args) => run_scan(args, config, ui),
        Commands::Delete(args) => run_delete(args, config, ui),
    }
}

#[derive(Debug, Clone, Copy)]
struct Ui {
    quiet: bool,
    color: bool,
    progress: bool,
}

fn apply_scan_args(config: &mut Config, args: &ScanArgs) {
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.verify_content |= args.verify;
    config.skip_hidden |= args.skip_hidden;
    config.skip_empty |= args.skip_empty;
    config.trash |= args.trash;
    config
        .ignore_patterns
        .extend(args.ignore_patterns.iter().cloned());
}

fn run_scan(args: ScanArgs, mut config: Config, ui: Ui) -> Result<ExitCode> {
    apply_scan_args(&mut config, &args);
    log::debug!("Effective configuration: {:?}", config);

    let walker_config = config.walker_config(args.min_size, args.max_size);
    let result = scan_root(&args.path, &config, walker_config, ui)?;

    let mut exit_code = scan_exit_code(&result);
    let deletion = if args.delete && result.has_duplicates() {
        let plan = DeletionPlanner::from_result(&result).plan(&result.select_all_but_first());
        confirm_and_execute(plan, &config, args.yes, ui)?
    } else {
        None
    };
    if deletion.as_ref().is_some_and(|r| !r.all_succeeded()) {
        exit_code = ExitCode::PartialSuccess;
    }

    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Json => {
            let mut report = JsonReport::new(&result, exit_code);
            if let Some(ref deletion) = deletion {
                report = report.with_deletion(deletion);
            }
            report.write_to(&mut stdout)?;
        }
        OutputFormat::Text => {
            let text = TextReport::new(ui.color);
            text.write_scan(&mut stdout, &result)?;
            if let Some(ref deletion) = deletion {
                text.write_deletion(&mut stdout, deletion)?;
            }
        }
    }

    Ok(exit_code)
}

/// Scan `root` with Ctrl+C cancellation and terminal progress.
fn scan_root(root: &Path, config: &Config, walker_config: WalkerConfig, ui: Ui) -> Result<ScanResult> {
    let handler = signal::install_handler()?;
    let (sender, receiver) = progress_channel(DEFAULT_PROGRESS_CAPACITY);
    let reporter = ProgressReporter::spawn(receiver, !ui.progress);

    let finder_config = config
        .finder_config(walker_config)
        .with_shutdown_flag(handler.flag())
        .with_progress(sender);

    // The sender travels with the config; the reporter stops once the scan
    // thread drops it.
    let outcome = start_scan(root, finder_config).and_then(ScanHandle::result);
    reporter.finish();
    outcome.with_context(|| format!("failed to scan {}", root.display()))
}

fn scan_exit_code(result: &ScanResult) -> ExitCode {
    if !result.errors.is_empty() {
        ExitCode::PartialSuccess
    } else if result.has_duplicates() {
        ExitCode::Success
    } else {
        ExitCode::NoDuplicates
    }
}

fn run_delete(args: DeleteArgs, mut config: Config, ui: Ui) -> Result<ExitCode> {
    config.trash |= args.trash;

    // Scanning the root gives the planner the sets it needs to protect the
    // last intact copy of every file.
    let result = scan_root(&args.root, &config, config.walker_config(None, None), ui)?;
    let plan = DeletionPlanner::from_result(&result)
        .with_allow_last_copy(args.allow_last_copy)
        .plan(&args.paths);

    // Rejected paths still get an outcome even if nothing is confirmed.
    let report = match confirm_and_execute(plan.clone(), &config, args.yes, ui)? {
        Some(report) => report,
        None => execute_plan(
            DeletionPlan {
                approved: Vec::new(),
                rejections: plan.rejections,
            },
            &config.delete_config(),
            None,
        ),
    };

    let exit_code = if report.all_succeeded() {
        ExitCode::Success
    } else {
        ExitCode::PartialSuccess
    };

    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Json => write_json(&mut stdout, &JsonDeletion::from(&report))?,
        OutputFormat::Text => TextReport::new(ui.color).write_deletion(&mut stdout, &report)?,
    }

    Ok(exit_code)
}

/// Ask before deleting, then execute. `None` means the user declined or
/// nothing was approved.
fn confirm_and_execute(
    plan: DeletionPlan,
    config: &Config,
    assume_yes: bool,
    ui: Ui,
) -> Result<Option<DeletionReport>> {
    if plan.is_empty() {
        if !ui.quiet {
            eprintln!("Nothing to delete.");
        }
        return Ok(None);
    }

    let delete_config = config.delete_config();
    if !assume_yes {
        let verb = if delete_config.permanent {
            "Permanently delete"
        } else {
            "Move to trash"
        };
        let prompt = format!(
            "{} {} file(s), freeing {}?",
            verb,
            plan.approved.len(),
            ByteSize::b(plan.approved_bytes())
        );
        if !prompt_confirm(&prompt)? {
            if !ui.quiet {
                eprintln!("Deletion cancelled.");
            }
            return Ok(None);
        }
    }

    let bar = DeletionProgressBar::new(plan.approved.len(), !ui.progress);
    let callback: &dyn DeleteProgressCallback = &bar;
    Ok(Some(execute_plan(plan, &delete_config, Some(callback))))
}

fn prompt_confirm(prompt: &str) -> Result<bool> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        bail!("refusing to delete without confirmation on a non-interactive terminal; pass --yes");
    }

    let mut stderr = io::stderr();
    write!(stderr, "{prompt} [y/N] ")?;
    stderr.flush()?;

    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
