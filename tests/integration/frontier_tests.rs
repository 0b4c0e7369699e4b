//! Frontier guarantees over a real database file shared by several connections

use linkscout::crawler::{EnqueueOutcome, Frontier, PriorityPolicy};
use linkscout::normalize_url;
use linkscout::storage::{SqliteStorage, Storage};
use linkscout::FrontierStatus;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

#[test]
fn test_concurrent_dequeuers_never_share_an_entry() {
    const WORKERS: usize = 4;
    const BATCH: usize = 10;
    const ENTRIES: usize = WORKERS * BATCH - 3;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("frontier.db");

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        for i in 0..ENTRIES {
            let url = format!("https://news.example.com/story-{}.html", i);
            assert!(storage.insert_frontier_url(&url, (i % 3) as u32, 1).unwrap());
        }
    }

    let connections: Vec<SqliteStorage> = (0..WORKERS)
        .map(|_| SqliteStorage::new(&db_path).unwrap())
        .collect();

    let handles: Vec<_> = connections
        .into_iter()
        .map(|mut storage| {
            thread::spawn(move || {
                storage
                    .claim_pending(BATCH)
                    .unwrap()
                    .into_iter()
                    .map(|entry| entry.url)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut claimed = Vec::new();
    for handle in handles {
        claimed.extend(handle.join().unwrap());
    }

    let unique: HashSet<&String> = claimed.iter().collect();
    assert_eq!(unique.len(), claimed.len(), "an entry was claimed twice");
    assert_eq!(claimed.len(), ENTRIES);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(
        storage.count_by_status(FrontierStatus::InProgress).unwrap(),
        ENTRIES as u64
    );
    assert_eq!(storage.count_by_status(FrontierStatus::Pending).unwrap(), 0);
}

#[test]
fn test_two_frontiers_on_one_file_share_dedup() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("frontier.db");

    let first = Frontier::new(
        Arc::new(Mutex::new(SqliteStorage::new(&db_path).unwrap())),
        PriorityPolicy::default(),
    );
    let second = Frontier::new(
        Arc::new(Mutex::new(SqliteStorage::new(&db_path).unwrap())),
        PriorityPolicy::default(),
    );

    let url = normalize_url("https://News.Example.com/markets/./today?ref=home#top", None).unwrap();
    assert_eq!(url.as_str(), "https://news.example.com/markets/today/");

    assert_eq!(first.enqueue(&url, 0).unwrap(), EnqueueOutcome::Inserted);
    assert_eq!(
        second.enqueue(&url, 3).unwrap(),
        EnqueueOutcome::AlreadyExists
    );

    let claimed = second.dequeue_batch(5).unwrap();
    assert_eq!(claimed.len(), 1);
    assert!(first.dequeue_batch(5).unwrap().is_empty());

    first.mark_crawled(url.as_str()).unwrap();
    assert_eq!(
        second.get(url.as_str()).unwrap().unwrap().status,
        FrontierStatus::Crawled
    );
}

#[test]
fn test_priority_then_age_ordering() {
    let dir = TempDir::new().unwrap();
    let frontier = Frontier::new(
        Arc::new(Mutex::new(
            SqliteStorage::new(&dir.path().join("frontier.db")).unwrap(),
        )),
        PriorityPolicy::default(),
    );

    for (url, priority) in [
        ("https://news.example.com/b/", 2),
        ("https://news.example.com/a.html", 0),
        ("https://news.example.com/live/", 1),
        ("https://news.example.com/c/", 2),
    ] {
        frontier.enqueue_with_priority(url, 0, priority).unwrap();
    }

    let urls: Vec<String> = frontier
        .dequeue_batch(4)
        .unwrap()
        .into_iter()
        .map(|entry| entry.url)
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://news.example.com/a.html",
            "https://news.example.com/live/",
            "https://news.example.com/b/",
            "https://news.example.com/c/",
        ]
    );
}

#[test]
fn test_recover_stale_entries_after_a_crash() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("frontier.db");

    {
        let crashed = Frontier::new(
            Arc::new(Mutex::new(SqliteStorage::new(&db_path).unwrap())),
            PriorityPolicy::default(),
        );
        let url = normalize_url("https://news.example.com/world/", None).unwrap();
        crashed.enqueue(&url, 0).unwrap();
        assert_eq!(crashed.dequeue_batch(1).unwrap().len(), 1);
    }

    let restarted = Frontier::new(
        Arc::new(Mutex::new(SqliteStorage::new(&db_path).unwrap())),
        PriorityPolicy::default(),
    );
    assert!(restarted.dequeue_batch(1).unwrap().is_empty());
    assert_eq!(restarted.requeue(FrontierStatus::InProgress).unwrap(), 1);
    assert_eq!(restarted.dequeue_batch(1).unwrap().len(), 1);
}
