use clap::{Args, Parser, Subcommand, ValueEnum};
use restruct_core::{CollisionPolicy, Options, DEFAULT_PROTECTED_DEPTH};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "restruct")]
#[command(version)]
#[command(about = "Flatten, rename and prune directory trees")]
#[command(long_about = "A CLI tool that restructures directory trees: collapse nested folders to a target depth, bulk-rename files and folders with %-templates, and delete files by depth or predicate.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        env = "RESTRUCT_PROTECTED_DEPTH",
        default_value_t = DEFAULT_PROTECTED_DEPTH,
        help = "Paths with this many segments or fewer require confirmation"
    )]
    pub protected_depth: usize,

    #[arg(long, global = true, env = "RESTRUCT_NO_GUARD", help = "Never ask for confirmation")]
    pub no_guard: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Move files below a depth up to that depth and remove the emptied folders")]
    Collapse {
        #[arg(short, long, help = "Template for the moved file names, e.g. '%B_%C[_]%E'")]
        template: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    #[command(about = "Rename files in place with a template")]
    RenameFiles {
        #[arg(help = "Template for the new names, e.g. '%TM%Y-%TM%m-%TM%d_%B%E'")]
        template: String,

        #[command(flatten)]
        common: CommonArgs,
    },

    #[command(about = "Rename folders with a template, deepest first")]
    RenameFolders {
        #[arg(help = "Template for the new names, e.g. '%B_old'")]
        template: String,

        #[command(flatten)]
        common: CommonArgs,
    },

    #[command(about = "Delete every file at or below a depth")]
    DeleteFiles {
        #[command(flatten)]
        common: CommonArgs,
    },

    #[command(about = "Delete files at or below a depth that match all given conditions")]
    DeleteIf {
        #[arg(long, help = "Only zero-byte files")]
        empty: bool,

        #[arg(long, help = "Only files with this extension (without the dot)")]
        extension: Option<String>,

        #[arg(long, help = "Only files whose name matches this regular expression")]
        name_regex: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    #[command(about = "Show what a template expands to for one file or folder")]
    Preview {
        #[arg(help = "Template to expand")]
        template: String,

        #[arg(help = "File or folder to expand it against")]
        path: PathBuf,

        #[arg(long, value_delimiter = ',', help = "Collapsed folder names for %C[...], comma separated")]
        collapsed: Option<Vec<String>>,
    },

    #[command(about = "Open a folder in the platform file browser")]
    Reveal {
        #[arg(help = "Folder to reveal (defaults to current directory)")]
        target: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct CommonArgs {
    #[arg(help = "Target directory (defaults to current directory)")]
    pub target: Option<PathBuf>,

    #[arg(short, long, default_value_t = 0, help = "Relative depth at which the operation starts")]
    pub start_depth: usize,

    #[arg(long, value_enum, default_value_t = Collision::Fail, help = "What to do when a target name is taken")]
    pub on_collision: Collision,

    #[arg(long, help = "Perform a dry run without making changes")]
    pub dry_run: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Collision {
    Fail,
    Suffix,
    Overwrite,
}

impl From<Collision> for CollisionPolicy {
    fn from(collision: Collision) -> Self {
        match collision {
            Collision::Fail => CollisionPolicy::Fail,
            Collision::Suffix => CollisionPolicy::Suffix,
            Collision::Overwrite => CollisionPolicy::Overwrite,
        }
    }
}

impl CommonArgs {
    pub fn options(&self) -> Options {
        Options {
            start_depth: self.start_depth,
            collision: self.on_collision.into(),
            dry_run: self.dry_run,
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
