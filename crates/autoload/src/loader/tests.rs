//! Tests for the loader module.

use std::any::Any;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tempfile::TempDir;

use autoload_core::Inflector;

use super::*;
use crate::definition::{same_definition, Definition, Handle, Namespace};
use crate::materializer::{MaterializeError, Materializer};

#[derive(Debug)]
struct Recorded {
    name: String,
    events: Arc<Mutex<Vec<String>>>,
}

impl Definition for Recorded {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn has_teardown(&self) -> bool {
        true
    }
    fn before_remove(&self) {
        self.events
            .lock()
            .unwrap()
            .push(format!("teardown {}", self.name));
    }
}

/// Records every materialization; files containing `broken` fail and files
/// containing `panic` panic.
#[derive(Default)]
struct RecordingMaterializer {
    count: AtomicUsize,
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingMaterializer {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Materializer for RecordingMaterializer {
    fn materialize(&self, name: &str, path: &Path) -> std::result::Result<Handle, MaterializeError> {
        if fs::read_to_string(path)?.contains("broken") {
            return Err(format!("{name} is broken").into());
        }
        if fs::read_to_string(path)?.contains("panic") {
            panic!("materializer panicked on {name}");
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("load {name}"));
        Ok(Arc::new(Recorded {
            name: name.to_string(),
            events: Arc::clone(&self.events),
        }))
    }
}

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "value: 1\n").unwrap();
}

fn temp_loader() -> (TempDir, Arc<RecordingMaterializer>, Loader) {
    let dir = TempDir::new().expect("create tempdir");
    let materializer = Arc::new(RecordingMaterializer::default());
    let loader = Loader::new(
        "main",
        Arc::new(Inflector::new()),
        Arc::clone(&materializer) as Arc<dyn Materializer>,
    );
    (dir, materializer, loader)
}

#[test]
fn resolve_before_setup_fails() {
    let (dir, _, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");
    loader.push_dir(dir.path()).unwrap();

    assert!(matches!(loader.resolve("User"), Err(LoadError::NotSetUp("main"))));
}

#[test]
fn push_dir_rejects_files_and_missing_paths() {
    let (dir, _, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");

    let err = loader.push_dir(dir.path().join("user.yml")).unwrap_err();
    assert!(matches!(err, LoadError::NotADirectory(_)));
    let err = loader.push_dir(dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, LoadError::NotADirectory(_)));
}

#[test]
fn configuration_is_rejected_after_setup() {
    let (dir, _, mut loader) = temp_loader();
    loader.push_dir(dir.path()).unwrap();
    loader.setup().unwrap();

    let err = loader.push_dir(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::AlreadySetUp { action: "push_dir", .. }));
    assert!(loader.enable_reloading().is_err());
    assert!(loader.on_unload(|_| {}).is_err());
    // A second setup is a no-op.
    assert_eq!(loader.setup().unwrap(), 0);
}

#[test]
fn lazy_root_materializes_on_first_lookup_only() {
    let (dir, materializer, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.do_not_eager_load(dir.path()).unwrap();

    assert_eq!(loader.setup().unwrap(), 0);
    assert!(!loader.is_loaded("User"));
    assert_eq!(materializer.count.load(Ordering::SeqCst), 0);

    let first = loader.resolve("User").unwrap();
    let second = loader.resolve("User").unwrap();
    assert!(same_definition(&first, &second));
    assert_eq!(materializer.count.load(Ordering::SeqCst), 1);
    assert_eq!(loader.loaded_names(), vec!["User"]);
}

#[test]
fn eager_root_is_materialized_by_setup() {
    let (dir, materializer, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");
    touch(dir.path(), "admin/role.yml");
    touch(dir.path(), "reports/daily.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.do_not_eager_load(dir.path().join("reports")).unwrap();

    let eager_loaded = loader.setup().unwrap();
    assert_eq!(eager_loaded, 3);
    assert!(loader.is_loaded("User"));
    assert!(loader.is_loaded("Admin"));
    assert!(loader.is_loaded("Admin::Role"));
    assert!(!loader.is_loaded("Reports"));
    assert!(!loader.is_loaded("Reports::Daily"));
    assert_eq!(materializer.count.load(Ordering::SeqCst), 2);
}

#[test]
fn nested_name_materializes_parents_first() {
    let (dir, _, mut loader) = temp_loader();
    touch(dir.path(), "admin/audit/entry.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.do_not_eager_load(dir.path()).unwrap();
    loader.setup().unwrap();

    let entry = loader.resolve("Admin::Audit::Entry").unwrap();
    assert!(entry.downcast_ref::<Recorded>().is_some());
    assert_eq!(
        loader.loaded_names(),
        vec!["Admin", "Admin::Audit", "Admin::Audit::Entry"]
    );

    let admin = loader.resolve("Admin").unwrap();
    let namespace = admin.downcast_ref::<Namespace>().unwrap();
    assert_eq!(namespace.dirs, vec![dir.path().join("admin")]);
}

#[test]
fn unknown_name_is_not_found() {
    let (dir, _, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.setup().unwrap();

    let err = loader.resolve("Account").unwrap_err();
    assert!(matches!(err, LoadError::NotFound(ref name) if name == "Account"));
    assert_eq!(err.to_string(), "uninitialized name Account");
}

#[test]
fn materialize_failure_registers_nothing() {
    let (dir, _, mut loader) = temp_loader();
    fs::write(dir.path().join("broken.yml"), "broken: true\n").unwrap();
    loader.push_dir(dir.path()).unwrap();
    loader.do_not_eager_load(dir.path()).unwrap();
    loader.setup().unwrap();

    let err = loader.resolve("Broken").unwrap_err();
    assert!(matches!(err, LoadError::Materialize { ref name, .. } if name == "Broken"));
    assert!(!loader.is_loaded("Broken"));
}

#[test]
fn reload_disabled_leaves_registry_untouched() {
    let (dir, materializer, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.setup().unwrap();
    let before = loader.resolve("User").unwrap();

    let err = loader.reload().unwrap_err();
    assert!(matches!(err, LoadError::ReloadingDisabled("main")));
    assert!(materializer.events().iter().all(|e| !e.starts_with("teardown")));
    assert!(same_definition(&before, &loader.resolve("User").unwrap()));
    assert!(loader.unloadable_names().is_empty());
    assert!(!loader.is_unloadable("User"));
}

#[test]
fn reload_tears_down_and_rebuilds() {
    let (dir, materializer, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.do_not_eager_load(dir.path()).unwrap();
    loader.enable_reloading().unwrap();
    loader.setup().unwrap();

    let old = loader.resolve("User").unwrap();
    assert!(loader.is_unloadable("User"));

    let summary = loader.reload().unwrap();
    assert_eq!(
        summary,
        ReloadSummary {
            unloaded: 1,
            torn_down: 1,
            eager_loaded: 0,
            failed: 0,
        }
    );
    assert!(!loader.is_loaded("User"));
    assert!(!loader.owns(&old));

    let new = loader.resolve("User").unwrap();
    assert!(!same_definition(&old, &new));
    assert_eq!(
        materializer.events(),
        vec!["load User", "teardown User", "load User"]
    );
}

#[test]
fn reload_tears_down_children_before_parents() {
    let (dir, materializer, mut loader) = temp_loader();
    touch(dir.path(), "admin.yml");
    touch(dir.path(), "admin/user.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.do_not_eager_load(dir.path()).unwrap();
    loader.enable_reloading().unwrap();
    loader.setup().unwrap();

    loader.resolve("Admin::User").unwrap();
    loader.reload().unwrap();

    assert_eq!(
        materializer.events(),
        vec![
            "load Admin",
            "load Admin::User",
            "teardown Admin::User",
            "teardown Admin"
        ]
    );
}

#[test]
fn reload_rescans_disk() {
    let (dir, _, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.do_not_eager_load(dir.path()).unwrap();
    loader.enable_reloading().unwrap();
    loader.setup().unwrap();

    loader.resolve("User").unwrap();
    assert!(matches!(loader.resolve("Account"), Err(LoadError::NotFound(_))));

    fs::remove_file(dir.path().join("user.yml")).unwrap();
    touch(dir.path(), "account.yml");
    loader.reload().unwrap();

    assert!(loader.resolve("Account").is_ok());
    assert!(matches!(loader.resolve("User"), Err(LoadError::NotFound(_))));
    assert_eq!(loader.defined_names().unwrap(), vec!["Account"]);
}

#[test]
fn reload_repeats_eager_pass() {
    let (dir, materializer, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.enable_reloading().unwrap();
    loader.setup().unwrap();
    let old = loader.resolve("User").unwrap();

    let summary = loader.reload().unwrap();
    assert_eq!(summary.eager_loaded, 1);
    assert!(loader.is_loaded("User"));
    assert!(!same_definition(&old, &loader.resolve("User").unwrap()));
    assert_eq!(materializer.count.load(Ordering::SeqCst), 2);
}

#[test]
fn reload_skips_broken_eager_definitions() {
    let (dir, materializer, mut loader) = temp_loader();
    touch(dir.path(), "account.yml");
    touch(dir.path(), "user.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.enable_reloading().unwrap();
    assert_eq!(loader.setup().unwrap(), 2);

    fs::write(dir.path().join("account.yml"), "broken: true\n").unwrap();
    let summary = loader.reload().unwrap();
    assert_eq!(
        summary,
        ReloadSummary {
            unloaded: 2,
            torn_down: 2,
            eager_loaded: 1,
            failed: 1,
        }
    );
    assert_eq!(
        materializer.events(),
        vec![
            "load Account",
            "load User",
            "teardown User",
            "teardown Account",
            "load User"
        ]
    );
    assert!(loader.is_loaded("User"));
    assert!(!loader.is_loaded("Account"));
    assert!(matches!(loader.resolve("Account"), Err(LoadError::Materialize { .. })));

    touch(dir.path(), "account.yml");
    assert!(loader.resolve("Account").is_ok());
}

#[test]
fn materializer_panic_leaves_loader_usable() {
    let (dir, _, mut loader) = temp_loader();
    fs::write(dir.path().join("exploding.yml"), "panic: true\n").unwrap();
    touch(dir.path(), "user.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.do_not_eager_load(dir.path()).unwrap();
    loader.setup().unwrap();

    let outcome = thread::scope(|s| s.spawn(|| loader.resolve("Exploding")).join());
    assert!(outcome.is_err());

    assert!(!loader.is_loaded("Exploding"));
    assert!(loader.resolve("User").is_ok());
    assert_eq!(loader.loaded_names(), vec!["User"]);
}

#[test]
fn callbacks_see_every_record() {
    let (dir, _, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");
    touch(dir.path(), "admin/role.yml");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let on_load = Arc::clone(&seen);
    let on_unload = Arc::clone(&seen);

    loader.push_dir(dir.path()).unwrap();
    loader.do_not_eager_load(dir.path()).unwrap();
    loader.enable_reloading().unwrap();
    loader
        .on_load(move |record| {
            on_load
                .lock()
                .unwrap()
                .push(format!("+{} {}", record.name(), record.path().is_some()));
        })
        .unwrap();
    loader
        .on_unload(move |record| {
            on_unload
                .lock()
                .unwrap()
                .push(format!("-{} {}", record.name(), record.has_teardown()));
        })
        .unwrap();
    loader.setup().unwrap();

    loader.resolve("Admin::Role").unwrap();
    loader.reload().unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "+Admin false",
            "+Admin::Role true",
            "-Admin::Role true",
            "-Admin false"
        ]
    );
}

#[test]
fn concurrent_lookups_materialize_once() {
    let (dir, materializer, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.do_not_eager_load(dir.path()).unwrap();
    loader.setup().unwrap();

    let loader = Arc::new(loader);
    let handles: Vec<Handle> = (0..8)
        .map(|_| {
            let loader = Arc::clone(&loader);
            thread::spawn(move || loader.resolve("User").unwrap())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|t| t.join().unwrap())
        .collect();

    assert_eq!(materializer.count.load(Ordering::SeqCst), 1);
    assert!(handles.windows(2).all(|w| same_definition(&w[0], &w[1])));
}

#[test]
fn handles_map_back_to_names() {
    let (dir, _, mut loader) = temp_loader();
    touch(dir.path(), "user.yml");
    loader.push_dir(dir.path()).unwrap();
    loader.setup().unwrap();

    let user = loader.resolve("User").unwrap();
    assert!(loader.owns(&user));
    assert_eq!(loader.name_of(&user).as_deref(), Some("User"));

    let stranger: Handle = Arc::new(Namespace {
        name: "User".into(),
        dirs: Vec::new(),
    });
    assert!(!loader.owns(&stranger));
}

#[test]
fn custom_extensions() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("user.toml"), "value = 1\n").unwrap();
    touch(dir.path(), "ignored.yml");

    let materializer = Arc::new(RecordingMaterializer::default());
    let mut loader = Loader::new("once", Arc::new(Inflector::new()), materializer)
        .with_extensions(["toml"]);
    loader.push_dir(dir.path()).unwrap();
    loader.setup().unwrap();

    assert_eq!(loader.loaded_names(), vec!["User"]);
    assert_eq!(loader.extensions(), ["toml".to_string()]);
}
