use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::depth::depth;
use crate::entity::{checked_name, Entity, File, Folder};
use crate::guard::GuardPolicy;
use crate::template::Template;
use crate::walker::{Order, TraversalEntry};
use crate::{Error, Result};

/// What to do when a move or rename lands on a path that is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    #[default]
    Fail,
    Suffix,
    /// Replace an existing file. Existing folders are never replaced.
    Overwrite,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Relative depth at which the operation starts to apply.
    pub start_depth: usize,
    pub collision: CollisionPolicy,
    pub dry_run: bool,
}

type RenameFn = Box<dyn Fn(&Entity, Option<&[String]>) -> String>;

pub enum RenameRule {
    Template(Template),
    /// Receives the entity and, during a collapse, the collapsed folder names.
    Function(RenameFn),
}

impl RenameRule {
    pub fn template(source: &str) -> Self {
        RenameRule::Template(Template::parse(source))
    }

    pub fn function(rename: impl Fn(&Entity, Option<&[String]>) -> String + 'static) -> Self {
        RenameRule::Function(Box::new(rename))
    }

    pub fn apply(&self, entity: &Entity, collapsed: Option<&[String]>) -> Result<String> {
        match self {
            RenameRule::Template(template) => Ok(template.render(entity, collapsed)?),
            RenameRule::Function(rename) => Ok(rename(entity, collapsed)),
        }
    }
}

impl fmt::Debug for RenameRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenameRule::Template(template) => f.debug_tuple("Template").field(&template.source()).finish(),
            RenameRule::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Counts of what a bulk operation changed, or would change in a dry run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub files_moved: usize,
    pub files_renamed: usize,
    pub folders_renamed: usize,
    pub files_deleted: usize,
    pub folders_deleted: usize,
}

/// Not transactional: a failure leaves the tree partially transformed.
pub struct Restructurer<'g> {
    guard: &'g GuardPolicy,
    options: Options,
}

impl<'g> Restructurer<'g> {
    pub fn new(guard: &'g GuardPolicy, options: Options) -> Self {
        Self { guard, options }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Moves every file deeper than `start_depth` up into its ancestor at
    /// `start_depth`, then removes the folders that held them.
    pub fn collapse(&self, root: &Folder, rule: Option<&RenameRule>) -> Result<Report> {
        self.bracketed(root, "collapse", |guard| {
            let start = self.options.start_depth;
            let root_depth = root.depth();
            let mut report = Report::default();
            let mut plan = Plan::default();

            for entry in root.walk(Order::BottomUp) {
                let entry = entry?;
                let relative = depth(&entry.root) - root_depth;
                debug!("Collapsing {:?} at relative depth {}", entry.root, relative);

                if relative > start {
                    let target = entry
                        .root
                        .ancestors()
                        .nth(relative - start)
                        .unwrap_or(root.path())
                        .to_path_buf();
                    let collapsed = collapsed_segments(&entry.root, &target);

                    for name in &entry.files {
                        let file = File::from_normalized(entry.root.join(name));
                        let new_name = match rule {
                            Some(rule) => named(rule.apply(&Entity::File(file.clone()), Some(collapsed.as_slice()))?)?,
                            None => name.clone(),
                        };
                        let Some(destination) = self.claim(file.path(), target.join(new_name), &mut plan)? else {
                            continue;
                        };

                        if self.options.dry_run {
                            info!("Would move file: {:?} -> {:?}", file.path(), destination);
                        } else {
                            info!("Moving file: {:?} -> {:?}", file.path(), destination);
                            file.move_to(&destination, guard)?;
                        }
                        report.files_moved += 1;
                    }
                }

                if relative + 1 > start {
                    for path in entry.folder_paths() {
                        self.remove_folder(&path, guard, &mut report)?;
                    }
                }
            }
            Ok(report)
        })
    }

    pub fn rename_files(&self, root: &Folder, rule: &RenameRule) -> Result<Report> {
        self.bracketed(root, "rename files", |guard| {
            let mut report = Report::default();
            let mut plan = Plan::default();

            self.for_each_files_at_depth(root, |entry| {
                for name in &entry.files {
                    let file = File::from_normalized(entry.root.join(name));
                    let new_name = named(rule.apply(&Entity::File(file.clone()), None)?)?;
                    let Some(destination) = self.claim(file.path(), entry.root.join(&new_name), &mut plan)? else {
                        continue;
                    };

                    if self.options.dry_run {
                        info!("Would rename file: {:?} -> {:?}", file.path(), destination);
                    } else {
                        info!("Renaming file: {:?} -> {:?}", file.path(), destination);
                        file.move_to(&destination, guard)?;
                    }
                    report.files_renamed += 1;
                }
                Ok(())
            })?;
            Ok(report)
        })
    }

    /// The root itself is never renamed.
    pub fn rename_folders(&self, root: &Folder, rule: &RenameRule) -> Result<Report> {
        self.bracketed(root, "rename folders", |guard| {
            let start = self.options.start_depth;
            let root_depth = root.depth();
            let mut report = Report::default();
            let mut plan = Plan::default();

            for entry in root.walk(Order::BottomUp) {
                let entry = entry?;
                let relative = depth(&entry.root) - root_depth;
                if relative + 1 < start {
                    continue;
                }

                for path in entry.folder_paths() {
                    let folder = Folder::from_normalized(path);
                    let new_name = named(rule.apply(&Entity::Folder(folder.clone()), None)?)?;
                    let Some(destination) = self.claim(folder.path(), entry.root.join(&new_name), &mut plan)? else {
                        continue;
                    };

                    if self.options.dry_run {
                        info!("Would rename folder: {:?} -> {:?}", folder.path(), destination);
                    } else {
                        info!("Renaming folder: {:?} -> {:?}", folder.path(), destination);
                        folder.move_to(&destination, guard)?;
                    }
                    report.folders_renamed += 1;
                }
            }
            Ok(report)
        })
    }

    pub fn delete_files(&self, root: &Folder) -> Result<Report> {
        self.delete_files_matching(root, "delete files", |_| true)
    }

    /// Deletes the files at relative depth `start_depth` or deeper for which
    /// `predicate` holds.
    pub fn delete_files_if(&self, root: &Folder, predicate: impl Fn(&File) -> bool) -> Result<Report> {
        self.delete_files_matching(root, "delete files if", predicate)
    }

    fn delete_files_matching(
        &self,
        root: &Folder,
        operation: &str,
        predicate: impl Fn(&File) -> bool,
    ) -> Result<Report> {
        self.bracketed(root, operation, |guard| {
            let mut report = Report::default();

            self.for_each_files_at_depth(root, |entry| {
                for path in entry.file_paths() {
                    let file = File::from_normalized(path);
                    if !predicate(&file) {
                        debug!("Keeping file: {:?}", file.path());
                        continue;
                    }

                    if self.options.dry_run {
                        info!("Would delete file: {:?}", file.path());
                    } else {
                        info!("Deleting file: {:?}", file.path());
                        file.remove(guard)?;
                    }
                    report.files_deleted += 1;
                }
                Ok(())
            })?;
            Ok(report)
        })
    }

    /// Runs `body` between a single guard check on `root` and a guard
    /// suspension that lasts until `body` returns.
    fn bracketed<T>(&self, root: &Folder, operation: &str, body: impl FnOnce(&GuardPolicy) -> Result<T>) -> Result<T> {
        if !root.exists() {
            return Err(Error::NotAFolder {
                path: root.path().to_path_buf(),
            });
        }

        info!(
            "Starting {} on {:?} (start depth {}, dry run: {})",
            operation,
            root.path(),
            self.options.start_depth,
            self.options.dry_run
        );
        if !self.options.dry_run {
            self.guard.warn(root.path(), operation)?;
        }

        let suspended = self.guard.suspend();
        body(&*suspended)
    }

    fn for_each_files_at_depth(
        &self,
        root: &Folder,
        mut visit: impl FnMut(&TraversalEntry) -> Result<()>,
    ) -> Result<()> {
        let root_depth = root.depth();
        for entry in root.walk(Order::TopDown) {
            let entry = entry?;
            let relative = depth(&entry.root) - root_depth;
            if relative < self.options.start_depth {
                debug!("Skipping files of {:?} at relative depth {}", entry.root, relative);
                continue;
            }
            visit(&entry)?;
        }
        Ok(())
    }

    fn remove_folder(&self, path: &Path, guard: &GuardPolicy, report: &mut Report) -> Result<()> {
        let folder = Folder::from_normalized(path.to_path_buf());
        if self.options.dry_run {
            info!("Would remove folder: {:?}", folder.path());
        } else if !folder.exists() {
            debug!("Folder already gone: {:?}", folder.path());
            return Ok(());
        } else {
            info!("Removing folder: {:?}", folder.path());
            folder.remove(guard)?;
        }
        report.folders_deleted += 1;
        Ok(())
    }

    /// Applies the collision policy to `destination`. Returns `None` when the
    /// entry keeps its current path and nothing needs to happen.
    fn claim(&self, source: &Path, destination: PathBuf, plan: &mut Plan) -> Result<Option<PathBuf>> {
        if destination == source {
            debug!("Name unchanged: {:?}", source);
            return Ok(None);
        }

        let destination = if !plan.is_taken(&destination, source) {
            destination
        } else {
            match self.options.collision {
                CollisionPolicy::Fail => {
                    return Err(Error::DestinationExists {
                        from: source.to_path_buf(),
                        to: destination,
                    })
                }
                CollisionPolicy::Overwrite if destination.is_dir() => {
                    return Err(Error::DestinationExists {
                        from: source.to_path_buf(),
                        to: destination,
                    })
                }
                CollisionPolicy::Overwrite => destination,
                CollisionPolicy::Suffix => {
                    let mut n = 1;
                    loop {
                        let candidate = suffixed(&destination, n);
                        if !plan.is_taken(&candidate, source) {
                            break candidate;
                        }
                        n += 1;
                    }
                }
            }
        };

        plan.claimed.insert(destination.clone());
        if destination == source {
            debug!("Already carries a free suffixed name: {:?}", source);
            return Ok(None);
        }
        plan.vacated.insert(source.to_path_buf());
        Ok(Some(destination))
    }
}

/// Paths handed out and paths given up so far in one operation.
#[derive(Debug, Default)]
struct Plan {
    claimed: HashSet<PathBuf>,
    vacated: HashSet<PathBuf>,
}

impl Plan {
    fn is_taken(&self, path: &Path, source: &Path) -> bool {
        if self.claimed.contains(path) {
            return true;
        }
        path != source && !self.vacated.contains(path) && path.symlink_metadata().is_ok()
    }
}

/// Folder names strictly below `target` down to and including `folder`.
fn collapsed_segments(folder: &Path, target: &Path) -> Vec<String> {
    folder
        .strip_prefix(target)
        .map(|relative| {
            relative
                .iter()
                .map(|segment| segment.to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// `report.txt` with `n = 2` becomes `report (2).txt`.
fn suffixed(path: &Path, n: usize) -> PathBuf {
    let stem = path.file_stem().unwrap_or_else(|| OsStr::new("")).to_string_lossy();
    let name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    path.with_file_name(name)
}

fn named(name: String) -> Result<OsString> {
    Ok(checked_name(&name)?.to_os_string())
}
