use super::resource_lock::ResourceLocks;

#[tokio::test]
async fn test_same_key_serializes() {
    let locks = ResourceLocks::new();
    let guard = locks.acquire("Raiden").await.unwrap();

    // A second acquire on the same key must wait while the guard is held.
    let pending = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        locks.acquire("Raiden"),
    )
    .await;
    assert!(pending.is_err(), "second acquire should still be waiting");

    drop(guard);
    assert!(locks.acquire("Raiden").await.is_ok());
}

#[tokio::test]
async fn test_different_keys_are_independent() {
    let locks = ResourceLocks::new();
    let _a = locks.acquire("Raiden").await.unwrap();
    let b = locks.acquire("Ayaka").await;
    assert!(b.is_ok());
}

#[tokio::test]
async fn test_released_keys_are_shed() {
    let locks = ResourceLocks::new();
    {
        let _a = locks.acquire("Raiden").await.unwrap();
        // Held keys survive other acquires.
        let _b = locks.acquire("Ayaka").await.unwrap();
        assert_eq!(locks.tracked_keys(), 2);
    }

    // Both guards dropped: the next acquire sheds the idle entries.
    let _c = locks.acquire("Hutao").await.unwrap();
    assert_eq!(locks.tracked_keys(), 1);
}

#[tokio::test]
async fn test_acquire_many_dedups_keys() {
    let locks = ResourceLocks::new();
    let guards = locks
        .acquire_many(&["Ayaka", "Raiden", "Ayaka"])
        .await
        .unwrap();
    assert_eq!(guards.len(), 2);
}
