//! Filesystem-backed tests for the directory watcher

use core_sync::{ChangeCallback, DirectoryWatcher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn counting_watcher(debounce: Duration) -> (DirectoryWatcher, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let callback: ChangeCallback = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let watcher = DirectoryWatcher::new(
        vec!["pdf".to_string(), "gp5".to_string()],
        debounce,
        callback,
    );
    (watcher, count)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_burst_of_files_triggers_one_callback() {
    let dir = tempfile::tempdir().unwrap();
    let (watcher, count) = counting_watcher(Duration::from_millis(300));
    watcher.add_path(dir.path()).unwrap();
    watcher.start().unwrap();

    for index in 0..5 {
        std::fs::write(dir.path().join(format!("song-{}.pdf", index)), b"%PDF").unwrap();
    }

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    watcher.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsupported_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (watcher, count) = counting_watcher(Duration::from_millis(200));
    watcher.add_path(dir.path()).unwrap();
    watcher.start().unwrap();

    std::fs::write(dir.path().join("notes.docx"), b"text").unwrap();
    std::fs::create_dir(dir.path().join("folder")).unwrap();

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);

    watcher.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stopped_watcher_stays_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let (watcher, count) = counting_watcher(Duration::from_millis(200));
    watcher.add_path(dir.path()).unwrap();
    watcher.start().unwrap();
    watcher.stop();

    std::fs::write(dir.path().join("late.pdf"), b"%PDF").unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
