mod cli;
mod filter;
mod prompt;

use anyhow::Result;
use cli::{Cli, Commands, CommonArgs};
use filter::DeleteFilter;
use restruct_core::{Entity, Folder, GuardPolicy, RenameRule, Report, Restructurer};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status when the operator refuses a guarded operation.
const EXIT_ABORTED: i32 = 2;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    setup_logging(&cli)?;

    info!("Starting restruct");

    let guard = GuardPolicy::new(cli.protected_depth, prompt::confirm_shallow_path);
    if cli.no_guard {
        warn!("Guard disabled, shallow paths will not be confirmed");
        guard.set_enabled(false);
    }

    let outcome = match cli.command {
        Commands::Collapse { template, common } => handle_collapse_command(template, common, &guard),
        Commands::RenameFiles { template, common } => handle_rename_command(template, common, false, &guard),
        Commands::RenameFolders { template, common } => handle_rename_command(template, common, true, &guard),
        Commands::DeleteFiles { common } => handle_delete_command(None, common, &guard),
        Commands::DeleteIf {
            empty,
            extension,
            name_regex,
            common,
        } => DeleteFilter::new(empty, extension, name_regex.as_deref())
            .and_then(|filter| handle_delete_command(Some(filter), common, &guard)),
        Commands::Preview {
            template,
            path,
            collapsed,
        } => handle_preview_command(&template, path, collapsed),
        Commands::Reveal { target } => handle_reveal_command(target),
    };

    if let Err(err) = &outcome {
        if let Some(restruct_core::Error::Aborted { path, operation }) = err.downcast_ref::<restruct_core::Error>() {
            error!("'{}' on {:?} was not confirmed, nothing was changed", operation, path);
            std::process::exit(EXIT_ABORTED);
        }
    }
    outcome?;

    info!("Restruct completed successfully");
    Ok(())
}

fn handle_collapse_command(template: Option<String>, common: CommonArgs, guard: &GuardPolicy) -> Result<()> {
    let root = resolve_root(common.target.clone())?;
    let rule = template.as_deref().map(RenameRule::template);

    info!("Collapse to depth {} in {}", common.start_depth, root);
    if let Some(template) = &template {
        info!("Renaming moved files with: '{}'", template);
    }
    announce_dry_run(&common);

    let report = Restructurer::new(guard, common.options()).collapse(&root, rule.as_ref())?;

    print_report("Collapse", &report, common.dry_run);
    Ok(())
}

fn handle_rename_command(template: String, common: CommonArgs, folders: bool, guard: &GuardPolicy) -> Result<()> {
    let root = resolve_root(common.target.clone())?;
    let rule = RenameRule::template(&template);
    let what = if folders { "folders" } else { "files" };

    info!("Renaming {} with '{}' from depth {} in {}", what, template, common.start_depth, root);
    announce_dry_run(&common);

    let restructurer = Restructurer::new(guard, common.options());
    let report = if folders {
        restructurer.rename_folders(&root, &rule)?
    } else {
        restructurer.rename_files(&root, &rule)?
    };

    print_report("Rename", &report, common.dry_run);
    Ok(())
}

fn handle_delete_command(filter: Option<DeleteFilter>, common: CommonArgs, guard: &GuardPolicy) -> Result<()> {
    let root = resolve_root(common.target.clone())?;

    info!("Deleting files from depth {} in {}", common.start_depth, root);
    if let Some(filter) = &filter {
        info!("Only files matching: {:?}", filter);
    }
    announce_dry_run(&common);

    let restructurer = Restructurer::new(guard, common.options());
    let report = match filter {
        Some(filter) => restructurer.delete_files_if(&root, |file| filter.matches(file))?,
        None => restructurer.delete_files(&root)?,
    };

    print_report("Delete", &report, common.dry_run);
    Ok(())
}

fn handle_preview_command(template: &str, path: PathBuf, collapsed: Option<Vec<String>>) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Path does not exist: {:?}", path);
    }

    let entity = Entity::from_path(&path)?;
    let name = restruct_core::expand(template, &entity, collapsed.as_deref())?;

    println!("{}", name);
    Ok(())
}

fn handle_reveal_command(target: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(target)?;
    root.reveal();
    Ok(())
}

/// The folder an operation runs on: the given target or the current
/// directory. It must exist and be a directory.
fn resolve_root(target: Option<PathBuf>) -> Result<Folder> {
    let target_dir = match target {
        Some(target) => target,
        None => std::env::current_dir()?,
    };

    if !target_dir.exists() {
        anyhow::bail!("Target directory does not exist: {:?}", target_dir);
    }

    if !target_dir.is_dir() {
        anyhow::bail!("Target must be a directory: {:?}", target_dir);
    }

    Ok(Folder::new(&target_dir)?)
}

fn announce_dry_run(common: &CommonArgs) {
    if common.dry_run {
        warn!("Dry run mode - no changes will be made");
    }
}

fn print_report(operation: &str, report: &Report, dry_run: bool) {
    if dry_run {
        println!("{} dry run complete, nothing was changed.", operation);
    } else {
        println!("{} complete!", operation);
    }
    println!("  Files moved: {}", report.files_moved);
    println!("  Files renamed: {}", report.files_renamed);
    println!("  Folders renamed: {}", report.folders_renamed);
    println!("  Files deleted: {}", report.files_deleted);
    println!("  Folders deleted: {}", report.folders_deleted);
}

fn setup_logging(cli: &Cli) -> Result<()> {
    let filter = if let Ok(filter) = EnvFilter::try_from_default_env() {
        filter
    } else if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact()
        )
        .with(filter)
        .init();

    Ok(())
}
