// Artifact cleanup tests. The process hooks are global, so every test that
// arms a registry holds the lock.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use serial_test::serial;

use evpipe::Channel::queue::make_fifo;
use evpipe::Channel::ChannelPaths;
use evpipe::Core::CleanupRegistry;

// Test lock to prevent parallel test execution
static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// Create the artifacts of `workers` channels the way a consumer would.
fn create_artifacts(dir: &Path, workers: usize) {
    for id in 0..workers {
        let paths = ChannelPaths::new(dir, "evpipe", id);
        std::fs::write(&paths.segment, [0u8; 128]).unwrap();
        make_fifo(&paths.full).unwrap();
        make_fifo(&paths.empty).unwrap();
    }
}

fn run_dir(parent: &Path) -> std::path::PathBuf {
    let dir = parent.join("evpipe-run");
    std::fs::create_dir(&dir).unwrap();
    dir
}

#[test]
#[serial]
fn test_cleanup_removes_everything() {
    let _guard = TEST_LOCK.lock();
    let parent = tempfile::tempdir().unwrap();
    let dir = run_dir(parent.path());
    create_artifacts(&dir, 2);

    let registry = CleanupRegistry::new(&dir, "evpipe", 2).unwrap();
    assert_eq!(registry.artifact_count(), 6);
    assert_eq!(registry.dir(), dir.as_path());
    assert!(!registry.is_cleaned());

    registry.cleanup();
    assert!(registry.is_cleaned());
    assert!(!dir.exists());

    // second call is a no-op
    registry.cleanup();
    println!("{:?}", registry);
}

#[test]
#[serial]
fn test_cleanup_tolerates_missing_artifacts() {
    let _guard = TEST_LOCK.lock();
    let parent = tempfile::tempdir().unwrap();
    let dir = run_dir(parent.path());
    // only the first of three channels was ever created
    create_artifacts(&dir, 1);

    let registry = CleanupRegistry::new(&dir, "evpipe", 3).unwrap();
    registry.cleanup();
    assert!(!dir.exists());
}

#[test]
#[serial]
fn test_drop_cleans_up() {
    let _guard = TEST_LOCK.lock();
    let parent = tempfile::tempdir().unwrap();
    let dir = run_dir(parent.path());
    create_artifacts(&dir, 1);

    {
        let _registry = CleanupRegistry::new(&dir, "evpipe", 1).unwrap();
    }
    assert!(!dir.exists());
}

#[test]
#[serial]
fn test_panic_hook_cleans_armed_registry() {
    let _guard = TEST_LOCK.lock();
    let parent = tempfile::tempdir().unwrap();
    let dir = run_dir(parent.path());
    create_artifacts(&dir, 1);

    let registry = Arc::new(CleanupRegistry::new(&dir, "evpipe", 1).unwrap());
    assert!(registry.install_process_hooks());
    assert_eq!(Arc::strong_count(&registry), 2);

    let result = thread::spawn(|| panic!("worker blew up")).join();
    assert!(result.is_err());
    assert!(registry.is_cleaned());
    assert!(!dir.exists());

    registry.uninstall_process_hooks();
    assert_eq!(Arc::strong_count(&registry), 1);
}

#[test]
#[serial]
fn test_disarmed_registry_survives_panic() {
    let _guard = TEST_LOCK.lock();
    let parent = tempfile::tempdir().unwrap();
    let dir = run_dir(parent.path());
    create_artifacts(&dir, 1);

    let registry = Arc::new(CleanupRegistry::new(&dir, "evpipe", 1).unwrap());
    assert!(registry.install_process_hooks());
    registry.uninstall_process_hooks();

    let result = thread::spawn(|| panic!("unrelated panic")).join();
    assert!(result.is_err());
    assert!(!registry.is_cleaned());
    assert!(dir.exists());

    drop(registry);
    assert!(!dir.exists());
}

#[test]
#[serial]
fn test_disarm_while_hooks_run() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let _guard = TEST_LOCK.lock();
    let parent = tempfile::tempdir().unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    // the panic hook walks the armed slots on every panic
    let panicker = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut panics = 0u32;
            loop {
                let _ = std::panic::catch_unwind(|| panic!("hook walk"));
                panics += 1;
                if stop.load(Ordering::Relaxed) {
                    break panics;
                }
            }
        })
    };

    for i in 0..200 {
        let dir = parent.path().join(format!("run-{}", i));
        let registry = Arc::new(CleanupRegistry::new(&dir, "evpipe", 1).unwrap());
        assert!(registry.install_process_hooks());
        registry.uninstall_process_hooks();
        assert_eq!(Arc::strong_count(&registry), 1);
    }

    stop.store(true, Ordering::Relaxed);
    assert!(panicker.join().unwrap() > 0);
}
