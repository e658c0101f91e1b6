//! `check` and `apply` - one reconciliation pass over a declaration file

use anyhow::{Context as AnyhowContext, Result, bail};
use declarative::{Engine, NoReport, ReportSink, ResourceDescriptor, RunOptions, RunReport};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::cli::{ApplyArgs, PassArgs};
use crate::ui::{self, TerminalReport};
use crate::{declaration, paths, system};

/// JSON output of a pass
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    file: &'a Path,
    #[serde(flatten)]
    report: &'a RunReport,
}

struct Declaration {
    path: PathBuf,
    descriptors: Vec<ResourceDescriptor>,
}

fn load(args: &PassArgs) -> Result<Declaration> {
    let path = paths::declaration_file(args.file.as_deref())?;
    let descriptors = declaration::load(&path)
        .with_context(|| format!("Failed to load declaration {}", path.display()))?;
    Ok(Declaration { path, descriptors })
}

fn run_pass(
    ctx: &Context,
    engine: &Engine,
    declaration: &Declaration,
    opts: &RunOptions,
    json: bool,
) -> Result<RunReport> {
    let mut terminal = TerminalReport::new(ctx.quiet);
    let mut silent = NoReport;
    let sink: &mut dyn ReportSink = if json { &mut silent } else { &mut terminal };

    engine
        .run(&declaration.descriptors, opts, sink)
        .with_context(|| format!("Invalid declaration {}", declaration.path.display()))
}

fn print_json(path: &Path, report: &RunReport) -> Result<()> {
    let output = JsonReport { file: path, report };
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to serialize report")?
    );
    Ok(())
}

/// Fail the process when any resource could not be checked or converged.
fn finish(report: &RunReport) -> Result<()> {
    if report.summary.is_success() {
        return Ok(());
    }
    let failed: Vec<_> = report.failures().map(|r| r.name.as_str()).collect();
    bail!("{} resources failed: {}", failed.len(), failed.join(", "))
}

pub fn check(ctx: &Context, args: &PassArgs) -> Result<()> {
    let declaration = load(args)?;
    let engine = Engine::new(system::host_probes());
    let opts = RunOptions::check().with_jobs(usize::from(args.jobs));

    let report = run_pass(ctx, &engine, &declaration, &opts, args.json)?;
    if args.json {
        print_json(&declaration.path, &report)?;
    }
    finish(&report)
}

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let pass = &args.pass;
    let declaration = load(pass)?;
    let engine = Engine::new(system::host_probes());

    // 1. Check first so the user sees what would change
    let check_opts = RunOptions::check().with_jobs(usize::from(pass.jobs));
    let checked = run_pass(ctx, &engine, &declaration, &check_opts, pass.json)?;

    let drifted = checked.drifted().count();
    if drifted == 0 {
        if pass.json {
            print_json(&declaration.path, &checked)?;
        } else if !ctx.quiet {
            ui::success("Nothing to apply");
        }
        return Ok(());
    }

    // 2. Confirm (unless --yes)
    if !args.yes && !confirm_proceed(drifted)? {
        ui::warn("Aborted, no changes made");
        return Ok(());
    }

    // 3. Converge
    let apply_opts = RunOptions::apply().with_jobs(usize::from(pass.jobs));
    let report = run_pass(ctx, &engine, &declaration, &apply_opts, pass.json)?;
    if pass.json {
        print_json(&declaration.path, &report)?;
    }
    finish(&report)
}

/// Confirm with user
fn confirm_proceed(drifted: usize) -> Result<bool> {
    use dialoguer::Confirm;

    // never hang waiting for input in CI or pipes
    if !std::io::stdin().is_terminal() {
        bail!("{drifted} resources need changes; stdin is not a terminal, re-run with --yes to apply");
    }

    ui::info(&format!("{drifted} resources need changes"));
    let confirmed = Confirm::new()
        .with_prompt("Apply?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}
