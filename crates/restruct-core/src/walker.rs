use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    TopDown,
    BottomUp,
}

/// One visited folder with the names of its immediate children, as they were
/// when the folder was listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalEntry {
    pub root: PathBuf,
    pub folders: Vec<OsString>,
    pub files: Vec<OsString>,
}

impl TraversalEntry {
    pub fn folder_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.folders.iter().map(|name| self.root.join(name))
    }

    pub fn file_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files.iter().map(|name| self.root.join(name))
    }
}

enum Frame {
    Pending(PathBuf),
    Listed(TraversalEntry),
}

/// Lazy traversal of a folder tree. Bottom-up listings may be stale by the
/// time their folder is yielded.
pub struct Walker<'a> {
    root: PathBuf,
    order: Order,
    follow_links: bool,
    on_error: Option<Box<dyn FnMut(&Error) + 'a>>,
    stack: Vec<Frame>,
    started: bool,
}

impl<'a> Walker<'a> {
    pub fn new(root: impl AsRef<Path>, order: Order) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            order,
            follow_links: false,
            on_error: None,
            stack: Vec::new(),
            started: false,
        }
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn on_error(mut self, hook: impl FnMut(&Error) + 'a) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Lists the immediate children of `path`, sorted by name.
    pub fn list(path: &Path, follow_links: bool) -> Result<TraversalEntry> {
        Self::list_with_descent(path, follow_links).map(|(entry, _)| entry)
    }

    fn list_with_descent(path: &Path, follow_links: bool) -> Result<(TraversalEntry, Vec<PathBuf>)> {
        let walk_error = |source: io::Error| Error::Walk {
            path: path.to_path_buf(),
            source,
        };

        let mut folders: Vec<(OsString, bool)> = Vec::new();
        let mut files = Vec::new();

        for entry in fs::read_dir(path).map_err(walk_error)? {
            let entry = entry.map_err(walk_error)?;
            let file_type = entry.file_type().map_err(walk_error)?;
            let name = entry.file_name();

            if file_type.is_dir() {
                folders.push((name, true));
            } else if file_type.is_symlink() && entry.path().is_dir() {
                folders.push((name, follow_links));
            } else {
                files.push(name);
            }
        }

        folders.sort();
        files.sort();

        let descend = folders
            .iter()
            .filter(|(_, descend)| *descend)
            .map(|(name, _)| path.join(name))
            .collect();
        let entry = TraversalEntry {
            root: path.to_path_buf(),
            folders: folders.into_iter().map(|(name, _)| name).collect(),
            files,
        };
        Ok((entry, descend))
    }

    fn push_children(&mut self, children: Vec<PathBuf>) {
        // reversed so the first child is popped first
        self.stack
            .extend(children.into_iter().rev().map(Frame::Pending));
    }

    fn report(&mut self, err: Error) -> Option<Result<TraversalEntry>> {
        match self.on_error.as_mut() {
            Some(hook) => {
                hook(&err);
                None
            }
            None => {
                self.stack.clear();
                Some(Err(err))
            }
        }
    }
}

impl Iterator for Walker<'_> {
    type Item = Result<TraversalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            self.stack.push(Frame::Pending(self.root.clone()));
        }

        while let Some(frame) = self.stack.pop() {
            let path = match frame {
                Frame::Listed(entry) => return Some(Ok(entry)),
                Frame::Pending(path) => path,
            };

            debug!("Listing folder: {:?}", path);
            let (entry, children) = match Self::list_with_descent(&path, self.follow_links) {
                Ok(listing) => listing,
                Err(Error::Walk { ref source, .. })
                    if source.kind() == io::ErrorKind::NotFound && path != self.root =>
                {
                    debug!("Folder vanished before it was listed: {:?}", path);
                    continue;
                }
                Err(err) => match self.report(err) {
                    Some(failure) => return Some(failure),
                    None => continue,
                },
            };

            match self.order {
                Order::TopDown => {
                    self.push_children(children);
                    return Some(Ok(entry));
                }
                Order::BottomUp => {
                    self.stack.push(Frame::Listed(entry));
                    self.push_children(children);
                }
            }
        }
        None
    }
}

impl fmt::Debug for Walker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("order", &self.order)
            .field("follow_links", &self.follow_links)
            .field("pending", &self.stack.len())
            .finish_non_exhaustive()
    }
}
