use taskdoc::{AddressCache, TaskdocError, parse_section_address, parse_task_list};

#[test]
fn parse_document_is_memoized_within_a_batch() {
    let cache = AddressCache::new();

    let first = cache.parse_document("/api/auth.md").unwrap();
    assert_eq!(first.path, "/api/auth.md");
    assert_eq!(first.slug, "auth");
    assert_eq!(first.namespace, "api");
    assert_eq!(first.cache_key, "/api/auth.md");

    let second = cache.parse_document("/api/auth.md").unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.stats().size, 1);
}

#[test]
fn legacy_docs_prefix_is_reinterpreted_as_namespace() {
    let cache = AddressCache::new();
    let addr = cache.parse_document("/docs/api/auth.md").unwrap();
    assert_eq!(addr.namespace, "docs/api");
}

#[test]
fn hierarchical_section_slug_round_trips() {
    let section =
        parse_section_address("api/authentication/jwt-tokens", Some("/api/auth.md")).unwrap();
    assert_eq!(
        section.full_path,
        "/api/auth.md#api/authentication/jwt-tokens"
    );
}

#[test]
fn root_level_documents_use_the_root_namespace() {
    let cache = AddressCache::new();
    let addr = cache.parse_document("readme.md").unwrap();
    assert_eq!(addr.path, "/readme.md");
    assert_eq!(addr.namespace, "root");
}

#[test]
fn clear_batch_forgets_everything() {
    let cache = AddressCache::new();
    cache.parse_document("/a.md").unwrap();
    cache.parse_task("/a.md#t", None).unwrap();
    assert_eq!(cache.stats().size, 2);

    cache.clear_batch();
    let stats = cache.stats();
    assert_eq!(stats.size, 0);
    assert!(stats.keys.is_empty());
}

#[test]
fn parse_errors_do_not_poison_the_cache() {
    let cache = AddressCache::new();
    assert!(cache.parse_document("").is_err());
    assert!(cache.parse_document("/no-extension").is_err());
    assert_eq!(cache.stats().size, 0);

    cache.parse_document("/ok.md").unwrap();
    assert_eq!(cache.stats().size, 1);
}

#[test]
fn task_lists_cap_at_the_slug_limit() {
    let slugs: Vec<String> = (0..11).map(|i| format!("task-{i}")).collect();
    let reference = format!("/plan.md#{}", slugs.join(","));
    let err = parse_task_list(&reference, 10).unwrap_err();
    match err {
        TaskdocError::InvalidAddress(message) => {
            assert!(message.contains("task count exceeds limit"), "{message}")
        }
        other => panic!("unexpected error: {other}"),
    }

    let (doc, tasks) = parse_task_list("/plan.md#a,b,c", 10).unwrap();
    assert_eq!(doc.path, "/plan.md");
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[2].full_path, "/plan.md#c");
}
