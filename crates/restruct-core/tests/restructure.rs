//! End-to-end scenarios over real temporary trees.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use restruct_core::{
    depth, CollisionPolicy, Entity, Error, File, Folder, GuardPolicy, Options, RenameRule, Restructurer,
};
use tempfile::TempDir;

struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        TestFixture { temp_dir }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn root(&self) -> Folder {
        Folder::new(self.path()).expect("Failed to open root folder")
    }

    fn create_file(&self, rel_path: &str, content: &str) {
        let path = self.path().join(rel_path);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent folders");
        fs::write(&path, content).expect("Failed to write file");
    }

    /// Every file below the root, as sorted relative paths.
    fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .root()
            .walk(restruct_core::Order::TopDown)
            .flat_map(|entry| entry.expect("Failed to walk").file_paths().collect::<Vec<_>>())
            .map(|path| path.strip_prefix(self.path()).unwrap().to_path_buf())
            .collect();
        files.sort();
        files
    }

    fn read(&self, rel_path: &str) -> String {
        fs::read_to_string(self.path().join(rel_path)).expect("Failed to read file")
    }
}

#[test]
fn collapse_flattens_whole_tree() {
    let fixture = TestFixture::new();
    fixture.create_file("a.txt", "a");
    fixture.create_file("sub/b.txt", "b");
    fixture.create_file("sub/deep/c.txt", "c");
    let guard = GuardPolicy::unguarded();

    Restructurer::new(&guard, Options::default())
        .collapse(&fixture.root(), None)
        .expect("Collapse failed");

    assert_eq!(
        fixture.files(),
        vec![PathBuf::from("a.txt"), PathBuf::from("b.txt"), PathBuf::from("c.txt")]
    );
    assert!(!fixture.path().join("sub").exists());
    assert_eq!(fixture.read("c.txt"), "c");
}

#[test]
fn collapse_disambiguates_with_collapsed_names() {
    let fixture = TestFixture::new();
    fixture.create_file("photos/2023/summer/img.jpg", "2023");
    fixture.create_file("photos/2024/summer/img.jpg", "2024");
    fixture.create_file("photos/cover.jpg", "cover");
    let guard = GuardPolicy::unguarded();
    let rule = RenameRule::template("%C[-]_%B%E");
    let options = Options {
        start_depth: 1,
        ..Options::default()
    };

    Restructurer::new(&guard, options)
        .collapse(&fixture.root(), Some(&rule))
        .expect("Collapse failed");

    assert_eq!(
        fixture.files(),
        vec![
            PathBuf::from("photos/2023-summer_img.jpg"),
            PathBuf::from("photos/2024-summer_img.jpg"),
            PathBuf::from("photos/cover.jpg"),
        ]
    );
    assert_eq!(fixture.read("photos/2024-summer_img.jpg"), "2024");
}

#[test]
fn collapse_collision_policies() {
    let cases = [
        (CollisionPolicy::Fail, vec!["b.txt", "sub/b.txt"]),
        (CollisionPolicy::Suffix, vec!["b (1).txt", "b.txt"]),
        (CollisionPolicy::Overwrite, vec!["b.txt"]),
    ];

    for (collision, expected) in cases {
        let fixture = TestFixture::new();
        fixture.create_file("b.txt", "top");
        fixture.create_file("sub/b.txt", "nested");
        let guard = GuardPolicy::unguarded();
        let options = Options {
            collision,
            ..Options::default()
        };

        let result = Restructurer::new(&guard, options).collapse(&fixture.root(), None);

        assert_eq!(result.is_err(), collision == CollisionPolicy::Fail, "{:?}", collision);
        let expected: Vec<PathBuf> = expected.into_iter().map(PathBuf::from).collect();
        assert_eq!(fixture.files(), expected, "{:?}", collision);
    }
}

#[test]
fn delete_if_only_touches_deep_empty_files() {
    let fixture = TestFixture::new();
    fixture.create_file("empty0.txt", "");
    fixture.create_file("one/empty1.txt", "");
    fixture.create_file("one/two/empty2.txt", "");
    fixture.create_file("one/two/full2.txt", "data");
    let guard = GuardPolicy::unguarded();
    let options = Options {
        start_depth: 2,
        ..Options::default()
    };

    let report = Restructurer::new(&guard, options)
        .delete_files_if(&fixture.root(), |file| file.size().map(|size| size == 0).unwrap_or(false))
        .expect("Delete failed");

    assert_eq!(report.files_deleted, 1);
    assert_eq!(
        fixture.files(),
        vec![
            PathBuf::from("empty0.txt"),
            PathBuf::from("one/empty1.txt"),
            PathBuf::from("one/two/full2.txt"),
        ]
    );
}

#[test]
fn rename_files_and_folders_together() {
    let fixture = TestFixture::new();
    fixture.create_file("music/album/track.MP3", "x");
    let guard = GuardPolicy::unguarded();
    let restructurer = Restructurer::new(&guard, Options::default());
    let root = fixture.root();

    restructurer
        .rename_files(&root, &RenameRule::function(|entity, _| entity.name().to_lowercase()))
        .expect("File rename failed");
    restructurer
        .rename_folders(&root, &RenameRule::template("[%B]"))
        .expect("Folder rename failed");

    assert_eq!(fixture.files(), vec![PathBuf::from("[music]/[album]/track.mp3")]);
}

#[test]
fn guard_state_survives_every_operation() {
    let fixture = TestFixture::new();
    fixture.create_file("x/y/z.txt", "z");
    let prompts = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&prompts);
    let guard = GuardPolicy::new(depth(fixture.path()), move |path: &Path, operation: &str| {
        log.borrow_mut().push((path.to_path_buf(), operation.to_string()));
        true
    });
    let restructurer = Restructurer::new(&guard, Options::default());
    let root = fixture.root();

    restructurer
        .rename_files(&root, &RenameRule::template("%B.bak"))
        .expect("Rename failed");
    assert!(guard.is_enabled());

    let err = restructurer
        .rename_files(&root, &RenameRule::template("%C[_]"))
        .unwrap_err();
    assert!(matches!(err, Error::Template(_)));
    assert!(guard.is_enabled());

    restructurer.collapse(&root, None).expect("Collapse failed");
    assert!(guard.is_enabled());

    let prompts = prompts.borrow();
    assert_eq!(prompts.len(), 3);
    assert!(prompts.iter().all(|(path, _)| path == fixture.path()));
    assert_eq!(prompts[2].1, "collapse");
    assert_eq!(fixture.files(), vec![PathBuf::from("z.bak")]);
}

#[test]
fn declined_guard_stops_before_any_change() {
    let fixture = TestFixture::new();
    fixture.create_file("sub/keep.txt", "keep");
    let guard = GuardPolicy::new(depth(fixture.path()), |_: &Path, _: &str| false);

    let err = Restructurer::new(&guard, Options::default())
        .collapse(&fixture.root(), None)
        .unwrap_err();

    assert!(matches!(err, Error::Aborted { .. }));
    assert_eq!(fixture.files(), vec![PathBuf::from("sub/keep.txt")]);
}

#[test]
fn single_entry_operations_are_guarded() {
    let fixture = TestFixture::new();
    fixture.create_file("doc.txt", "doc");
    let guard = GuardPolicy::new(depth(fixture.path()), |_: &Path, _: &str| false);
    let file = File::new(fixture.path().join("doc.txt")).unwrap();

    // the file's own path is one segment deeper than the threshold
    file.rename("other.txt", &guard).expect("Rename below threshold must not prompt");

    let folder = Folder::new(fixture.path()).unwrap();
    assert!(matches!(folder.remove(&guard), Err(Error::Aborted { .. })));
    assert!(fixture.path().join("other.txt").is_file());
}

#[test]
fn template_preview_matches_rename() {
    let fixture = TestFixture::new();
    fixture.create_file("report.final.txt", "r");
    let entity = Entity::from_path(fixture.path().join("report.final.txt")).unwrap();

    assert_eq!(restruct_core::expand("%B|%E", &entity, None).unwrap(), "report.final|.txt");
}
