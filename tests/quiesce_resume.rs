use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use corethpool::{Job, PoolBuilder};

/// `wait()` drives the pool to quiescence; while quiesced, neither existing
/// nor newly submitted jobs run until `reactivate()` (§4.4).
#[test]
fn wait_quiesces_and_reactivate_resumes() {
    let pool = Arc::new(PoolBuilder::new().num_threads(2).build().unwrap());

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let counter = Arc::clone(&counter);
        pool.add_work(Job::new(move |_w| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }

    pool.wait().unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 10);
    assert_eq!(pool.num_threads_working(), 0);

    let counter2 = Arc::clone(&counter);
    let submitted = Arc::new(AtomicBool::new(false));
    let submitted2 = Arc::clone(&submitted);
    let pool2 = Arc::clone(&pool);
    let handle = thread::spawn(move || {
        pool2
            .add_work(Job::new(move |_w| {
                counter2.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        submitted2.store(true, Ordering::SeqCst);
    });

    thread::sleep(Duration::from_millis(150));
    assert_eq!(
        counter.load(Ordering::SeqCst),
        10,
        "a quiesced pool must not run a newly submitted job"
    );

    pool.reactivate().unwrap();
    handle.join().unwrap();
    assert!(submitted.load(Ordering::SeqCst));

    pool.wait().unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 11);

    pool.shutdown().unwrap();
    Arc::try_unwrap(pool)
        .unwrap_or_else(|_| panic!("test thread should be the only remaining owner"))
        .destroy()
        .unwrap();
}

#[test]
fn wait_returns_immediately_on_an_already_idle_pool() {
    let pool = PoolBuilder::new().num_threads(2).build().unwrap();
    pool.wait().unwrap();
    pool.wait().unwrap();
    pool.shutdown().unwrap();
    pool.destroy().unwrap();
}
