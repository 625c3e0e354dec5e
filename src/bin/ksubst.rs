// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use ksubst::{
    config::ModeDefinition,
    git::GitWorkspace,
    path::default_config_path,
    ChangeSet, Classification, Depth, InclusionPolicy, Mode, ModeSession, NeverCancel,
    ProviderBatch, ResourceRef, Scan, Severity,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use std::{
    fs::{canonicalize, create_dir_all, read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  ksubst [options] <ksubst-command> [<path>]...",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to mode definition file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => default_config_path()?,
        };

        match self.command {
            Command::Scan(opts) => run_scan(&config_path, opts),
            Command::Apply(opts) => run_apply(&config_path, opts),
            Command::InitConfig(opts) => run_init_config(&config_path, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show keyword substitution mode of selected files.
    #[command(override_usage = "ksubst scan [options] [<path>]...")]
    Scan(ScanOptions),

    /// Change keyword substitution mode of selected files.
    #[command(override_usage = "ksubst apply [options] [<path>]...")]
    Apply(ApplyOptions),

    /// Write default mode definition file.
    #[command(override_usage = "ksubst init-config [options]")]
    InitConfig(InitConfigOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ScanOptions {
    /// Files or directories to select.
    #[arg(value_name = "path", default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Target mode instead of inferring one per file, e.g., "kb".
    #[arg(short, long, value_name = "mode")]
    pub mode: Option<Mode>,

    /// How far to descend from selected paths.
    #[arg(short, long, value_enum, default_value_t = DepthArg::Infinite)]
    pub depth: DepthArg,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ApplyOptions {
    #[command(flatten)]
    pub selection: ScanOptions,

    /// Include committed files without local edits.
    #[arg(long)]
    pub include_unchanged: bool,

    /// Include committed files with local edits, requires --include-unchanged.
    #[arg(long)]
    pub include_changed: bool,

    /// Leave file untouched.
    #[arg(short, long, value_name = "path")]
    pub exclude: Vec<PathBuf>,

    /// Use specific mode for a file.
    #[arg(short, long = "override", value_name = "path=mode", value_parser = parse_override)]
    pub overrides: Vec<(PathBuf, Mode)>,

    /// Only show what would be changed.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not ask any questions.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitConfigOptions {
    /// Overwrite existing mode definition file.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DepthArg {
    Zero,
    One,
    Infinite,
}

impl From<DepthArg> for Depth {
    fn from(depth: DepthArg) -> Self {
        match depth {
            DepthArg::Zero => Depth::Zero,
            DepthArg::One => Depth::One,
            DepthArg::Infinite => Depth::Infinite,
        }
    }
}

fn parse_override(data: &str) -> Result<(PathBuf, Mode)> {
    let (path, mode) = data
        .rsplit_once('=')
        .ok_or_else(|| anyhow!("expected <path>=<mode>, got {data:?}"))?;
    Ok((PathBuf::from(path), mode.parse()?))
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = Cli::parse().run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn load_definition(config_path: &Path) -> Result<ModeDefinition> {
    match read_to_string(config_path) {
        Ok(data) => data
            .parse()
            .with_context(|| format!("malformed mode definition {:?}", config_path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("no mode definition at {:?}, using defaults", config_path.display());
            Ok(ModeDefinition::default())
        }
        Err(err) => Err(err).with_context(|| format!("cannot read {:?}", config_path.display())),
    }
}

struct Selection {
    definition: ModeDefinition,
    workspace: GitWorkspace,
    roots: Vec<ResourceRef>,
}

fn select(config_path: &Path, opts: &ScanOptions) -> Result<Selection> {
    let definition = load_definition(config_path)?;
    let paths = opts
        .paths
        .iter()
        .map(|path| canonicalize(path).with_context(|| format!("cannot resolve {:?}", path.display())))
        .collect::<Result<Vec<_>>>()?;
    let workspace = GitWorkspace::discover(&paths)?
        .with_default_text_mode(definition.settings.default_text_mode);
    let roots = paths.into_iter().map(ResourceRef::new).collect();

    Ok(Selection {
        definition,
        workspace,
        roots,
    })
}

fn scan(selection: &Selection, opts: &ScanOptions) -> Result<Scan> {
    let session = ModeSession::new(&selection.workspace, selection.definition.mode_patterns()?);
    let scan = session.scan(&selection.roots, opts.depth.into(), opts.mode);
    for problem in &scan.problems {
        warn!("{problem}");
    }

    Ok(scan)
}

fn print_records(change_set: &ChangeSet, actionable_only: bool) {
    for record in change_set.iter() {
        if actionable_only && !record.is_actionable() {
            continue;
        }

        println!(
            "{:<9} {:>4} -> {:<4} {}",
            record.classification.to_string(),
            record.current_mode.short_display(),
            record.proposed_mode.short_display(),
            record.file
        );
    }
}

fn run_scan(config_path: &Path, opts: ScanOptions) -> Result<()> {
    let selection = select(config_path, &opts)?;
    let scan = scan(&selection, &opts)?;
    print_records(&scan.change_set, false);

    let summary = scan
        .change_set
        .summary()
        .into_iter()
        .map(|(class, count)| format!("{count} {class}"))
        .collect::<Vec<_>>()
        .join(", ");
    info!("{} files: {summary}", scan.change_set.len());

    Ok(())
}

fn run_apply(config_path: &Path, opts: ApplyOptions) -> Result<()> {
    let selection = select(config_path, &opts.selection)?;
    let mut scan = scan(&selection, &opts.selection)?;
    let change_set = &mut scan.change_set;

    let mut policy = selection.definition.policy();
    policy.include_unchanged |= opts.include_unchanged;
    policy.include_changed |= opts.include_changed;
    if !opts.yes {
        policy = ask_policy(change_set, policy)?;
    }
    policy.apply(change_set);

    for (path, mode) in &opts.overrides {
        let file = find_file(change_set, path)?;
        change_set.set_proposed_mode(&file, *mode)?;
    }
    for path in &opts.exclude {
        let file = find_file(change_set, path)?;
        change_set.set_excluded(&file, true)?;
    }

    let session = ModeSession::new(&selection.workspace, selection.definition.mode_patterns()?);
    let batches = session.batches(change_set);
    if batches.is_empty() {
        info!("nothing to change");
        return Ok(());
    }

    print_records(change_set, true);
    if opts.dry_run {
        info!("dry run, leaving {} repositories untouched", batches.len());
        return Ok(());
    }

    let actionable = change_set.actionable_records().len();
    if !opts.yes
        && !Confirm::new(&format!("Change mode of {actionable} files?"))
            .with_default(true)
            .prompt()?
    {
        info!("nothing changed");
        return Ok(());
    }

    let bar = ProgressBar::new(batches.len() as u64);
    bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);
    let mut applier = |batch: &ProviderBatch| {
        bar.set_message(batch.connection.to_string());
        let status = selection.workspace.apply(batch);
        bar.inc(1);
        status
    };
    let outcome = session.apply(change_set, &mut applier, &NeverCancel);
    bar.finish_and_clear();

    for (connection, status) in &outcome.per_connection {
        match status.effective_severity() {
            Severity::Ok => info!("{connection}: {}", status.message),
            _ => warn!("{connection}: {}", status.message),
        }
    }

    if outcome.severity == Severity::Error {
        return Err(anyhow!("{}", outcome.message()));
    }

    info!("{}", outcome.message());
    Ok(())
}

fn ask_policy(change_set: &ChangeSet, mut policy: InclusionPolicy) -> Result<InclusionPolicy> {
    let summary = change_set.summary();
    let count = |class| summary.get(&class).copied().unwrap_or_default();

    let unchanged = count(Classification::Unchanged);
    if unchanged > 0 && !policy.include_unchanged {
        policy.include_unchanged =
            Confirm::new(&format!("Also change {unchanged} committed files without local edits?"))
                .with_default(false)
                .prompt()?;
    }

    let changed = count(Classification::Changed);
    if changed > 0 && policy.include_unchanged && !policy.include_changed {
        policy.include_changed =
            Confirm::new(&format!("Also change {changed} committed files with local edits?"))
                .with_default(false)
                .prompt()?;
    }

    Ok(policy)
}

fn find_file(change_set: &ChangeSet, path: &Path) -> Result<ksubst::FileHandle> {
    let path = canonicalize(path).with_context(|| format!("cannot resolve {:?}", path.display()))?;
    change_set
        .iter()
        .find(|record| record.file.path() == path)
        .map(|record| record.file.clone())
        .ok_or_else(|| anyhow!("{:?} is not part of the selection", path.display()))
}

fn run_init_config(config_path: &Path, opts: InitConfigOptions) -> Result<()> {
    if config_path.exists() && !opts.force {
        return Err(anyhow!(
            "{:?} already exists, use --force to overwrite it",
            config_path.display()
        ));
    }

    if let Some(parent) = config_path.parent() {
        create_dir_all(parent).with_context(|| format!("cannot create {:?}", parent.display()))?;
    }

    write(config_path, ModeDefinition::default().to_string())
        .with_context(|| format!("cannot write {:?}", config_path.display()))?;
    info!("wrote mode definition to {:?}", config_path.display());

    Ok(())
}
