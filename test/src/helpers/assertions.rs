/// Assert that the client holds a replicated copy of `$handle`
#[macro_export]
macro_rules! assert_replicated {
    ($peers:expr, $handle:expr) => {
        assert!(
            $peers.remote().is_replicated($handle) && $peers.world.has($handle),
            "object {:?} should be replicated to the client",
            $handle
        );
    };
}

/// Assert that the client no longer knows `$handle`
#[macro_export]
macro_rules! assert_not_replicated {
    ($peers:expr, $handle:expr) => {
        assert!(
            !$peers.remote().is_replicated($handle),
            "object {:?} should not be replicated to the client",
            $handle
        );
    };
}

/// Assert that no ordering rule was broken on the receiving side
#[macro_export]
macro_rules! assert_no_violations {
    ($peers:expr) => {
        assert!(
            $peers.world.violations.is_empty(),
            "ordering violations: {:?}",
            $peers.world.violations
        );
    };
}

/// Assert that the server holds nothing on behalf of the client any more
#[macro_export]
macro_rules! assert_refs_released {
    ($system:expr) => {
        assert_eq!($system.registry().total_connection_refs(), 0, "connection refs left");
        assert_eq!($system.live_baseline_count(), 0, "baselines left");
    };
}
