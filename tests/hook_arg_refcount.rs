use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use corethpool::{Job, PoolBuilder};

/// The shared hook argument's destructor must run exactly once, only after
/// every worker's reference and the pool's own reference have all been
/// released (§4.6).
#[test]
fn hook_arg_destructor_fires_exactly_once_after_last_reference() {
    let payload = Arc::new(AtomicUsize::new(42));
    let destructor_calls = Arc::new(AtomicUsize::new(0));
    let destructor_calls_for_hook = Arc::clone(&destructor_calls);

    let pool = PoolBuilder::new()
        .num_threads(4)
        .hook_arg(
            Arc::clone(&payload),
            Some(move |_value: &Arc<AtomicUsize>| {
                destructor_calls_for_hook.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .build()
        .unwrap();

    for _ in 0..20 {
        pool.add_work(Job::new(|worker| {
            let value = worker
                .hook_arg::<Arc<AtomicUsize>>()
                .expect("hook arg should be present");
            assert_eq!(value.load(Ordering::SeqCst), 42);
        }))
        .unwrap();
    }

    pool.wait().unwrap();
    assert_eq!(
        destructor_calls.load(Ordering::SeqCst),
        0,
        "workers are still alive and holding references"
    );

    pool.shutdown().unwrap();
    pool.destroy().unwrap();

    assert_eq!(
        destructor_calls.load(Ordering::SeqCst),
        1,
        "destructor must run exactly once, after the very last reference drops"
    );
}

/// With a single worker, the pool's own init-time reference is transient
/// (dropped as soon as that one worker has taken its clone), so once the
/// worker calls `unref_hook_arg` its clone was the only one left: the
/// destructor must fire immediately, inline, during the job itself — long
/// before `shutdown`/`destroy` ever run.
#[test]
fn unref_hook_arg_releases_a_workers_reference_early() {
    let payload = Arc::new(7u32);
    let destructor_calls = Arc::new(AtomicUsize::new(0));
    let destructor_calls_for_hook = Arc::clone(&destructor_calls);

    let pool = PoolBuilder::new()
        .num_threads(1)
        .hook_arg(
            Arc::clone(&payload),
            Some(move |_value: &Arc<u32>| {
                destructor_calls_for_hook.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .build()
        .unwrap();

    pool.add_work(Job::new(|worker| {
        assert!(worker.hook_arg::<Arc<u32>>().is_some());
        worker.unref_hook_arg();
        assert!(worker.hook_arg::<Arc<u32>>().is_none());
    }))
    .unwrap();

    pool.wait().unwrap();
    assert_eq!(
        destructor_calls.load(Ordering::SeqCst),
        1,
        "the sole worker's unref_hook_arg dropped the last reference; the \
         destructor must already have run by the time wait() returns, well \
         before shutdown/destroy"
    );

    pool.shutdown().unwrap();
    pool.destroy().unwrap();

    assert_eq!(
        destructor_calls.load(Ordering::SeqCst),
        1,
        "destructor must not run a second time during shutdown/destroy"
    );
}
