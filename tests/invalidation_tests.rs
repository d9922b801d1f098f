use methodcache_core::{Cache, CacheConfigBuilder, RuntimePolicy};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};

fn fresh_cache() -> Cache<usize> {
    Cache::new(CacheConfigBuilder::new().enable_background_cleanup(false).build())
}

#[test]
fn test_tag_based_invalidation() {
    static COUNTER1: AtomicUsize = AtomicUsize::new(0);
    static COUNTER2: AtomicUsize = AtomicUsize::new(0);

    let cache = fresh_cache();
    let policy = RuntimePolicy::new().with_tags(vec!["test_tag".to_string()]);

    let v1 = cache
        .get_or_create("fn1", || Ok::<_, Infallible>(COUNTER1.fetch_add(1, Ordering::SeqCst)), &policy, "fn1")
        .unwrap();
    let v2 = cache
        .get_or_create("fn2", || Ok::<_, Infallible>(COUNTER2.fetch_add(1, Ordering::SeqCst)), &policy, "fn2")
        .unwrap();
    assert_eq!(v1, 0);
    assert_eq!(v2, 0);

    // Cached calls do not advance the counters.
    assert_eq!(cache.try_get("fn1"), Some(0));
    assert_eq!(cache.try_get("fn2"), Some(0));

    cache.invalidate_by_tags(&["test_tag".to_string()]);
    assert_eq!(cache.try_get("fn1"), None);
    assert_eq!(cache.try_get("fn2"), None);

    let v1_new = cache
        .get_or_create("fn1", || Ok::<_, Infallible>(COUNTER1.fetch_add(1, Ordering::SeqCst)), &policy, "fn1")
        .unwrap();
    assert_eq!(v1_new, 1);
}

#[test]
fn test_multiple_tags_invalidate_independently() {
    let cache = fresh_cache();
    let a = RuntimePolicy::new().with_tags(vec!["a".to_string()]);
    let b = RuntimePolicy::new().with_tags(vec!["b".to_string()]);
    cache.get_or_create("x", || Ok::<_, Infallible>(1), &a, "m").unwrap();
    cache.get_or_create("y", || Ok::<_, Infallible>(2), &b, "m").unwrap();

    cache.invalidate_by_tags(&["a".to_string()]);
    assert_eq!(cache.try_get("x"), None);
    assert_eq!(cache.try_get("y"), Some(2));
}

#[test]
fn test_pattern_invalidation_only_matches_glob() {
    let cache = fresh_cache();
    let tagged = |tag: &str| RuntimePolicy::new().with_tags(vec![tag.to_string()]);
    cache.get_or_create("u1", || Ok::<_, Infallible>(1), &tagged("user:1"), "m").unwrap();
    cache.get_or_create("u2", || Ok::<_, Infallible>(2), &tagged("user:2"), "m").unwrap();
    cache.get_or_create("o1", || Ok::<_, Infallible>(3), &tagged("order:1"), "m").unwrap();

    cache.invalidate_by_tag_pattern("user:?");
    assert_eq!(cache.try_get("u1"), None);
    assert_eq!(cache.try_get("u2"), None);
    assert_eq!(cache.try_get("o1"), Some(3));
}

#[test]
fn test_invalidate_by_keys_removes_only_named_entries() {
    let cache = fresh_cache();
    let policy = RuntimePolicy::new();
    cache.get_or_create("keep", || Ok::<_, Infallible>(1), &policy, "m").unwrap();
    cache.get_or_create("drop", || Ok::<_, Infallible>(2), &policy, "m").unwrap();

    cache.invalidate_by_keys(&["drop".to_string()]);
    assert_eq!(cache.try_get("drop"), None);
    assert_eq!(cache.try_get("keep"), Some(1));
}
