use std::io;
use std::path::{Path, PathBuf};

pub mod depth;
pub mod entity;
pub mod guard;
pub mod restructure;
pub mod template;
pub mod walker;

pub use depth::depth;
pub use entity::{Entity, File, Folder, Timestamps};
pub use guard::{Confirm, GuardPolicy, Suspended, DEFAULT_PROTECTED_DEPTH};
pub use restructure::{CollisionPolicy, Options, RenameRule, Report, Restructurer};
pub use template::{expand, Template, TemplateError, TimeKind, Token};
pub use walker::{Order, TraversalEntry, Walker};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not list {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("Cannot move {from:?} to {to:?}: destination already exists")]
    DestinationExists { from: PathBuf, to: PathBuf },
    #[error("Invalid entry name: {name:?}")]
    InvalidName { name: String },
    #[error("Cannot copy {from:?} into itself at {to:?}")]
    CopyIntoSelf { from: PathBuf, to: PathBuf },
    #[error("Not a folder: {path:?}")]
    NotAFolder { path: PathBuf },
    #[error("Operator declined '{operation}' on {path:?}")]
    Aborted { path: PathBuf, operation: String },
}

impl Error {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
        move |source| Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
