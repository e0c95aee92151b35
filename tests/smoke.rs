use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use corethpool::{Job, PoolBuilder};

#[test]
fn runs_every_submitted_job_exactly_once() {
    let pool = PoolBuilder::new()
        .name_prefix("smoke")
        .num_threads(4)
        .build()
        .expect("pool should start");

    let completed = Arc::new(AtomicUsize::new(0));
    for _ in 0..200 {
        let completed = Arc::clone(&completed);
        pool.add_work(Job::new(move |_worker| {
            completed.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }

    pool.wait().unwrap();
    assert_eq!(completed.load(Ordering::SeqCst), 200);
    assert_eq!(pool.num_threads_working(), 0);

    pool.shutdown().unwrap();
    assert_eq!(pool.num_threads_alive(), 0);
    pool.destroy().unwrap();
}

#[test]
fn start_and_end_hooks_see_every_worker() {
    let seen_start = Arc::new(AtomicUsize::new(0));
    let seen_end = Arc::new(AtomicUsize::new(0));
    let (s1, s2) = (Arc::clone(&seen_start), Arc::clone(&seen_end));

    let pool = PoolBuilder::new()
        .num_threads(3)
        .start_hook(move |_worker| {
            s1.fetch_add(1, Ordering::SeqCst);
        })
        .end_hook(move |_worker| {
            s2.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    pool.wait().unwrap();
    pool.shutdown().unwrap();
    pool.destroy().unwrap();

    assert_eq!(seen_start.load(Ordering::SeqCst), 3);
    assert_eq!(seen_end.load(Ordering::SeqCst), 3);
}

#[test]
fn randomized_workload_completes_exactly_once_each() {
    let mut rng = XorShiftRng::seed_from_u64(0xC0FFEE);
    let pool = PoolBuilder::new().num_threads(6).build().unwrap();

    let job_count = rng.gen_range(100..400);
    let completed = Arc::new(AtomicUsize::new(0));
    for _ in 0..job_count {
        let completed = Arc::clone(&completed);
        let spin = rng.gen_range(0..2_000u32);
        pool.add_work(Job::new(move |_worker| {
            let mut acc = 0u32;
            for i in 0..spin {
                acc = acc.wrapping_add(i);
            }
            std::hint::black_box(acc);
            completed.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }

    pool.wait().unwrap();
    assert_eq!(completed.load(Ordering::SeqCst), job_count);

    pool.shutdown().unwrap();
    pool.destroy().unwrap();
}

#[test]
fn worker_context_slot_is_private_per_worker() {
    let pool = PoolBuilder::new().num_threads(2).build().unwrap();

    for i in 0..10 {
        pool.add_work(Job::new(move |worker| {
            worker.set_context(i);
            let mine = *worker.get_context::<i32>().unwrap();
            assert_eq!(mine, i);
            worker.unset_context();
            assert!(worker.get_context::<i32>().is_none());
        }))
        .unwrap();
    }

    pool.wait().unwrap();
    pool.shutdown().unwrap();
    pool.destroy().unwrap();
}
