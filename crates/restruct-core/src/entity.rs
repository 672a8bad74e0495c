use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::depth::{depth, normalize};
use crate::guard::GuardPolicy;
use crate::walker::{Order, Walker};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub accessed: SystemTime,
    pub modified: SystemTime,
    pub created: SystemTime,
}

impl Timestamps {
    fn read(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let accessed = metadata.accessed()?;
        let modified = metadata.modified()?;
        let created = match metadata.created() {
            Ok(created) => created,
            Err(err) => status_changed(&metadata).ok_or(err)?,
        };
        Ok(Self {
            accessed,
            modified,
            created,
        })
    }

    /// The earliest of the three.
    pub fn least(&self) -> SystemTime {
        self.accessed.min(self.modified).min(self.created)
    }
}

#[cfg(unix)]
fn status_changed(metadata: &fs::Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    use std::time::Duration;

    let seconds = u64::try_from(metadata.ctime()).ok()?;
    let nanos = u32::try_from(metadata.ctime_nsec()).ok()?;
    SystemTime::UNIX_EPOCH.checked_add(Duration::new(seconds, nanos))
}

#[cfg(not(unix))]
fn status_changed(_metadata: &fs::Metadata) -> Option<SystemTime> {
    None
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            path: normalize(path).map_err(Error::io(path))?,
        })
    }

    pub(crate) fn from_normalized(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        file_name_of(&self.path)
    }

    /// Name without its last extension: `report.final.txt` gives `report.final`.
    pub fn basename(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Last extension including the dot, or an empty string.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }

    pub fn folder_path(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }

    pub fn folder(&self) -> Folder {
        Folder::from_normalized(self.folder_path().to_path_buf())
    }

    pub fn depth(&self) -> usize {
        depth(self.folder_path())
    }

    pub fn exists(&self) -> bool {
        self.path.exists() && !self.path.is_dir()
    }

    pub fn size(&self) -> Result<u64> {
        let metadata = fs::metadata(&self.path).map_err(Error::io(&self.path))?;
        Ok(metadata.len())
    }

    pub fn times(&self) -> io::Result<Timestamps> {
        Timestamps::read(&self.path)
    }

    pub fn create(&self, create_folder: bool) -> Result<&Self> {
        if create_folder {
            self.folder().create()?;
        }
        fs::File::create(&self.path).map_err(Error::io(&self.path))?;
        debug!("Created file: {:?}", self.path);
        Ok(self)
    }

    /// Moves the file to exactly `destination`, replacing a file already there.
    pub fn move_to(&self, destination: &Path, guard: &GuardPolicy) -> Result<File> {
        guard.warn(&self.path, "move file")?;
        let destination = normalize(destination).map_err(Error::io(destination))?;

        match fs::rename(&self.path, &destination) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                debug!("Cannot rename across devices, copying {:?} instead", self.path);
                fs::copy(&self.path, &destination).map_err(Error::io(&self.path))?;
                fs::remove_file(&self.path).map_err(Error::io(&self.path))?;
            }
            Err(err) => return Err(Error::io(&self.path)(err)),
        }
        Ok(File::from_normalized(destination))
    }

    /// Renames the file within its folder. `new_name` must be a bare name.
    pub fn rename(&self, new_name: &str, guard: &GuardPolicy) -> Result<File> {
        let destination = self.folder_path().join(checked_name(new_name)?);
        guard.warn(&self.path, "rename file")?;
        fs::rename(&self.path, &destination).map_err(Error::io(&self.path))?;
        Ok(File::from_normalized(destination))
    }

    pub fn copy_to(&self, destination: &Path) -> Result<File> {
        let destination = normalize(destination).map_err(Error::io(destination))?;
        fs::copy(&self.path, &destination).map_err(Error::io(&self.path))?;
        Ok(File::from_normalized(destination))
    }

    pub fn remove(&self, guard: &GuardPolicy) -> Result<()> {
        guard.warn(&self.path, "remove file")?;
        fs::remove_file(&self.path).map_err(Error::io(&self.path))
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Folder {
    path: PathBuf,
}

impl Folder {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            path: normalize(path).map_err(Error::io(path))?,
        })
    }

    pub(crate) fn from_normalized(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        file_name_of(&self.path)
    }

    pub fn depth(&self) -> usize {
        depth(&self.path)
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    pub fn times(&self) -> io::Result<Timestamps> {
        Timestamps::read(&self.path)
    }

    pub fn create(&self) -> Result<&Self> {
        fs::create_dir_all(&self.path).map_err(Error::io(&self.path))?;
        Ok(self)
    }

    /// Removes the folder and everything below it.
    pub fn remove(&self, guard: &GuardPolicy) -> Result<()> {
        guard.warn(&self.path, "remove folder")?;
        fs::remove_dir_all(&self.path).map_err(Error::io(&self.path))
    }

    /// Moves the folder to exactly `destination`. Unlike files there is no
    /// copy fallback across filesystems.
    pub fn move_to(&self, destination: &Path, guard: &GuardPolicy) -> Result<Folder> {
        guard.warn(&self.path, "move folder")?;
        let destination = normalize(destination).map_err(Error::io(destination))?;
        fs::rename(&self.path, &destination).map_err(Error::io(&self.path))?;
        Ok(Folder::from_normalized(destination))
    }

    pub fn rename(&self, new_name: &str, guard: &GuardPolicy) -> Result<Folder> {
        let parent = self.path.parent().unwrap_or(&self.path);
        let destination = parent.join(checked_name(new_name)?);
        guard.warn(&self.path, "rename folder")?;
        fs::rename(&self.path, &destination).map_err(Error::io(&self.path))?;
        Ok(Folder::from_normalized(destination))
    }

    /// Recursively copies this folder so that it becomes `destination`.
    pub fn copy_to(&self, destination: &Path) -> Result<Folder> {
        let destination = normalize(destination).map_err(Error::io(destination))?;
        if destination.starts_with(&self.path) {
            return Err(Error::CopyIntoSelf {
                from: self.path.clone(),
                to: destination,
            });
        }

        for entry in self.walk(Order::TopDown) {
            let entry = entry?;
            let relative = entry.root.strip_prefix(&self.path).unwrap_or(Path::new(""));
            let target = destination.join(relative);
            fs::create_dir_all(&target).map_err(Error::io(&target))?;

            for file in &entry.files {
                let from = entry.root.join(file);
                fs::copy(&from, target.join(file)).map_err(Error::io(&from))?;
            }
        }
        Ok(Folder::from_normalized(destination))
    }

    pub fn walk(&self, order: Order) -> Walker<'static> {
        Walker::new(&self.path, order)
    }

    /// Immediate children, folders first, each group sorted by name.
    pub fn entries(&self) -> Result<Vec<Entity>> {
        let listing = Walker::list(&self.path, false)?;
        let folders = listing
            .folder_paths()
            .map(|path| Entity::Folder(Folder::from_normalized(path)));
        let files = listing
            .file_paths()
            .map(|path| Entity::File(File::from_normalized(path)));
        Ok(folders.chain(files).collect())
    }

    /// Best effort, failures are only logged.
    pub fn reveal(&self) {
        let program = if cfg!(target_os = "macos") {
            "open"
        } else if cfg!(windows) {
            "explorer"
        } else {
            "xdg-open"
        };

        match Command::new(program).arg(&self.path).spawn() {
            Ok(_) => info!("Revealed {:?} with {}", self.path, program),
            Err(err) => warn!("Could not reveal {:?} with {}: {}", self.path, program, err),
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entity {
    File(File),
    Folder(Folder),
}

impl Entity {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(Error::io(path))?;
        if metadata.is_dir() {
            Ok(Entity::Folder(Folder::new(path)?))
        } else {
            Ok(Entity::File(File::new(path)?))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Entity::File(file) => file.path(),
            Entity::Folder(folder) => folder.path(),
        }
    }

    pub fn name(&self) -> String {
        file_name_of(self.path())
    }

    pub fn basename(&self) -> String {
        match self {
            Entity::File(file) => file.basename(),
            Entity::Folder(folder) => folder.name(),
        }
    }

    pub fn times(&self) -> io::Result<Timestamps> {
        Timestamps::read(self.path())
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Entity::File(_))
    }
}

/// Accepts only names that stay inside the parent folder.
pub(crate) fn checked_name(name: &str) -> Result<&OsStr> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains(std::path::MAIN_SEPARATOR);

    if invalid {
        return Err(Error::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(OsStr::new(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_name_parts() {
        let file = File::new("/srv/reports/report.final.txt").unwrap();

        assert_eq!(file.name(), "report.final.txt");
        assert_eq!(file.basename(), "report.final");
        assert_eq!(file.extension(), ".txt");
        assert_eq!(file.folder_path(), Path::new("/srv/reports"));
    }

    #[test]
    fn test_file_without_extension() {
        let file = File::new("/srv/Makefile").unwrap();
        assert_eq!(file.basename(), "Makefile");
        assert_eq!(file.extension(), "");

        let dotfile = File::new("/home/user/.bashrc").unwrap();
        assert_eq!(dotfile.basename(), ".bashrc");
        assert_eq!(dotfile.extension(), "");
    }

    #[test]
    fn test_file_depth_is_folder_depth() {
        let file = File::new("/srv/reports/q1.txt").unwrap();
        let folder = Folder::new("/srv/reports").unwrap();
        assert_eq!(file.depth(), folder.depth());
    }

    #[test]
    fn test_create_and_remove() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let guard = GuardPolicy::unguarded();

        let file = File::new(temp_dir.path().join("nested/dir/note.txt")).unwrap();
        file.create(true).unwrap();
        assert!(file.exists());
        assert_eq!(file.size().unwrap(), 0);

        file.remove(&guard).unwrap();
        assert!(!file.exists());

        let folder = Folder::new(temp_dir.path().join("nested")).unwrap();
        folder.remove(&guard).unwrap();
        assert!(!folder.exists());
    }

    #[test]
    fn test_move_and_rename() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let guard = GuardPolicy::unguarded();

        let file = File::new(temp_dir.path().join("a/one.txt")).unwrap();
        file.create(true).unwrap();

        let moved = file.move_to(&temp_dir.path().join("one.txt"), &guard).unwrap();
        assert!(!file.exists());
        assert!(moved.exists());

        let renamed = moved.rename("two.txt", &guard).unwrap();
        assert_eq!(renamed.name(), "two.txt");
        assert!(renamed.exists());
        assert!(!moved.exists());
    }

    #[test]
    fn test_rename_rejects_paths() {
        let guard = GuardPolicy::unguarded();
        let file = File::new("/srv/data/one.txt").unwrap();

        assert!(matches!(file.rename("../escape.txt", &guard), Err(Error::InvalidName { .. })));
        assert!(matches!(file.rename("", &guard), Err(Error::InvalidName { .. })));
        assert!(matches!(file.rename("..", &guard), Err(Error::InvalidName { .. })));
    }

    #[test]
    fn test_guarded_remove_declined() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = File::new(temp_dir.path().join("keep.txt")).unwrap();
        file.create(false).unwrap();

        // every path counts as shallow with this threshold
        let guard = GuardPolicy::new(usize::MAX, |_: &Path, _: &str| false);
        assert!(matches!(file.remove(&guard), Err(Error::Aborted { .. })));
        assert!(file.exists());
    }

    #[test]
    fn test_folder_copy_and_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = Folder::new(temp_dir.path().join("source")).unwrap();
        File::new(source.path().join("top.txt")).unwrap().create(true).unwrap();
        File::new(source.path().join("inner/deep.txt")).unwrap().create(true).unwrap();

        let copy = source.copy_to(&temp_dir.path().join("copy")).unwrap();
        assert!(copy.path().join("top.txt").is_file());
        assert!(copy.path().join("inner/deep.txt").is_file());

        let entries = copy.entries().unwrap();
        let names: Vec<String> = entries.iter().map(Entity::name).collect();
        assert_eq!(names, vec!["inner", "top.txt"]);
        assert!(!entries[0].is_file());
        assert!(entries[1].is_file());
    }

    #[test]
    fn test_folder_copy_into_itself_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = Folder::new(temp_dir.path().join("source")).unwrap();
        File::new(source.path().join("inner/deep.txt")).unwrap().create(true).unwrap();

        let result = source.copy_to(&source.path().join("inner/copy"));

        assert!(matches!(result, Err(Error::CopyIntoSelf { .. })));
        assert!(!source.path().join("inner/copy").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_move_leaves_no_copy() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let guard = GuardPolicy::unguarded();
        let locked = temp_dir.path().join("locked");
        let file = File::new(locked.join("b.txt")).unwrap();
        file.create(true).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // privileged users ignore the mode bits
        if fs::write(locked.join("writable"), "").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let destination = temp_dir.path().join("b.txt");
        let result = file.move_to(&destination, &guard);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(result, Err(Error::Io { .. })));
        assert!(file.exists());
        assert!(!destination.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_status_change_time_stands_in_for_creation() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("stamped.txt");
        let handle = fs::File::create(&path).unwrap();
        let old = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000);
        handle.set_times(fs::FileTimes::new().set_modified(old)).unwrap();

        // setting the times touches the inode, so its change time is recent
        let changed = status_changed(&fs::metadata(&path).unwrap()).unwrap();
        assert!(changed > old);

        let times = File::new(&path).unwrap().times().unwrap();
        assert!(times.created > old);
    }

    #[test]
    fn test_timestamps_least() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("stamped.txt");
        let handle = fs::File::create(&path).unwrap();

        let old = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000);
        handle
            .set_times(fs::FileTimes::new().set_modified(old).set_accessed(SystemTime::now()))
            .unwrap();

        let times = File::new(&path).unwrap().times().unwrap();
        assert_eq!(times.modified, old);
        assert_eq!(times.least(), old);
    }

    #[test]
    fn test_entity_from_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file_path = temp_dir.path().join("x.bin");
        fs::write(&file_path, b"data").unwrap();

        assert!(Entity::from_path(&file_path).unwrap().is_file());
        assert!(!Entity::from_path(temp_dir.path()).unwrap().is_file());
        assert_eq!(
            Entity::from_path(temp_dir.path()).unwrap().basename(),
            Folder::new(temp_dir.path()).unwrap().name()
        );
    }
}
