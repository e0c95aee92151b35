use corethpool::{ErrorKind, Job, Passport, PoolBuilder, PoolState};

/// An externally-supplied passport must keep reporting useful, safe
/// answers through its `*_debug_conc` surface even after the pool it was
/// bound to has been fully destroyed — the whole point of the design
/// (§2, §4.5, §4.8).
#[test]
fn debug_conc_surface_rejects_calls_after_destroy() {
    let passport = Passport::new();
    let pool = PoolBuilder::new()
        .num_threads(2)
        .passport(passport.clone())
        .build()
        .unwrap();

    let pool_id = pool.id();
    assert_eq!(passport.state(), PoolState::Alive);

    pool.add_work(Job::new(|_w| {})).unwrap();
    pool.wait().unwrap();

    // The diagnostic surface works identically to the default one while
    // the pool is alive.
    passport
        .wait_debug_conc(pool_id)
        .expect("diagnostic wait should succeed while alive");

    pool.shutdown().unwrap();
    pool.destroy().unwrap();

    assert_eq!(passport.state(), PoolState::Destroyed);

    let err = passport
        .add_work_debug_conc(pool_id, Job::new(|_w| {}))
        .expect_err("a destroyed pool must reject new work, never touch freed memory");
    assert_eq!(err.kind(), ErrorKind::Inval);

    let err = passport
        .wait_debug_conc(pool_id)
        .expect_err("a destroyed pool must reject wait()");
    assert_eq!(err.kind(), ErrorKind::Inval);
}

#[test]
fn debug_conc_surface_rejects_mismatched_pool_id() {
    let passport_a = Passport::new();
    let pool_a = PoolBuilder::new()
        .num_threads(1)
        .passport(passport_a.clone())
        .build()
        .unwrap();

    let pool_b = PoolBuilder::new().num_threads(1).build().unwrap();
    let wrong_id = pool_b.id();

    let err = passport_a
        .add_work_debug_conc(wrong_id, Job::new(|_w| {}))
        .expect_err("a passport bound to pool A must reject pool B's id");
    assert_eq!(err.kind(), ErrorKind::Inval);

    pool_a.shutdown().unwrap();
    pool_a.destroy().unwrap();
    pool_b.shutdown().unwrap();
    pool_b.destroy().unwrap();
}
