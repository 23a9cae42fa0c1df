/// Asserts that the given type is Send and Sync.
///
/// All public types must be usable from concurrent callers; the
/// wrapped and cached tiers are explicitly shared for reads across
/// threads.
macro_rules! assert_send_and_sync {
    ( $t:ty ) => {
        impl crate::types::Sendable for $t {}
        impl crate::types::Syncable for $t {}
    };
}
