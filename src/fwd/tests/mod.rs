// Copyright (C) Microsoft Corporation. All rights reserved.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

#[derive(Default)]
struct Counters {
    queries: AtomicUsize,
    unqueries: AtomicUsize,
}

impl Counters {
    fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn unqueries(&self) -> usize {
        self.unqueries.load(Ordering::SeqCst)
    }
}

struct MockBackend {
    name: String,
    counters: Arc<Counters>,
    cacheable: bool,
    has_context: bool,
    tables: Vec<(Category, AlgorithmTable)>,
    ctx: u32,
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn context(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.has_context
            .then_some(&self.ctx as &(dyn Any + Send + Sync))
    }

    fn query_operation(&self, category: Category) -> Option<(AlgorithmTable, bool)> {
        self.counters.queries.fetch_add(1, Ordering::SeqCst);
        let table = self
            .tables
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, t)| t.clone())?;
        Some((table, self.cacheable))
    }

    fn unquery_operation(&self, _category: Category, _table: AlgorithmTable) {
        self.counters.unqueries.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockScope {
    counters: Arc<Counters>,
    cacheable: bool,
    has_context: bool,
    fail_load: bool,
    tables: Vec<(Category, AlgorithmTable)>,
}

impl MockScope {
    fn new(tables: Vec<(Category, AlgorithmTable)>, cacheable: bool) -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            cacheable,
            has_context: true,
            fail_load: false,
            tables,
        }
    }
}

impl LibScope for MockScope {
    fn load_backend(&self, name: &str) -> Option<Box<dyn Backend>> {
        if self.fail_load {
            return None;
        }
        Some(Box::new(MockBackend {
            name: name.to_string(),
            counters: self.counters.clone(),
            cacheable: self.cacheable,
            has_context: self.has_context,
            tables: self.tables.clone(),
            ctx: 0,
        }))
    }
}

fn entry(names: &str, ids: &[(u32, &'static str)]) -> AlgorithmEntry {
    AlgorithmEntry::new(
        names,
        ids.iter()
            .map(|&(id, label)| FwdDispatch::new(id, FwdFunc::new(label)))
            .collect(),
    )
}

fn signature_table() -> AlgorithmTable {
    Arc::from(vec![
        entry("RSA-PSS:rsassaPss", &[(1, "pss-sign")]),
        entry("RSA:rsaEncryption", &[(1, "rsa-sign"), (2, "rsa-verify")]),
        entry("ECDSA", &[(1, "ec-sign")]),
    ])
}

fn label(func: &FwdFunc) -> &'static str {
    func.downcast_ref::<&'static str>().expect("not a label")
}

#[test]
fn test_alias_token_matching() {
    let scope = MockScope::new(vec![(Category::Signature, signature_table())], true);
    let fwd = ForwardingProvider::init("default", &scope).expect("init failed");

    let lookup = |algorithm| fwd.get_func(Category::Signature, algorithm, 1);

    // Complete tokens match, across aliases and case.
    assert_eq!(label(&lookup("RSA").unwrap()), "rsa-sign");
    assert_eq!(label(&lookup("rsa").unwrap()), "rsa-sign");
    assert_eq!(label(&lookup("rsaEncryption").unwrap()), "rsa-sign");
    assert_eq!(label(&lookup("RSA-PSS").unwrap()), "pss-sign");
    assert_eq!(label(&lookup("rsassapss").unwrap()), "pss-sign");

    // Substrings of a token never match.
    assert!(lookup("RS").is_none());
    assert!(lookup("PSS").is_none());
    assert!(lookup("rsaEncr").is_none());
}

#[test]
fn test_degenerate_alias_lists_never_match() {
    let degenerate = Arc::from(vec![
        entry("", &[(1, "empty")]),
        entry(":", &[(1, "delimiter-only")]),
        entry("::", &[(1, "delimiters-only")]),
    ]);
    let scope = MockScope::new(vec![(Category::KeyManagement, degenerate)], true);
    let fwd = ForwardingProvider::init("default", &scope).expect("init failed");

    assert!(fwd.get_func(Category::KeyManagement, "RSA", 1).is_none());
    assert!(fwd.get_func(Category::KeyManagement, "EC", 1).is_none());
}

#[test]
fn test_function_id_selection() {
    let scope = MockScope::new(vec![(Category::Signature, signature_table())], true);
    let fwd = ForwardingProvider::init("default", &scope).expect("init failed");

    let verify = fwd.get_func(Category::Signature, "RSA", 2).unwrap();
    assert_eq!(label(&verify), "rsa-verify");

    // The first matching entry is authoritative: an id it lacks is a miss
    // even when a later entry under the same alias would carry it.
    let shadowed = Arc::from(vec![
        entry("EC", &[(1, "first")]),
        entry("EC", &[(2, "second")]),
    ]);
    let scope = MockScope::new(vec![(Category::KeyManagement, shadowed)], true);
    let fwd = ForwardingProvider::init("default", &scope).expect("init failed");

    assert_eq!(
        label(&fwd.get_func(Category::KeyManagement, "EC", 1).unwrap()),
        "first"
    );
    assert!(fwd.get_func(Category::KeyManagement, "EC", 2).is_none());
}

#[test]
fn test_cacheable_table_queried_once() {
    let scope = MockScope::new(vec![(Category::Signature, signature_table())], true);
    let fwd = ForwardingProvider::init("default", &scope).expect("init failed");

    let first = fwd.get_func(Category::Signature, "RSA", 1).unwrap();
    let second = fwd.get_func(Category::Signature, "RSA", 1).unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(scope.counters.queries(), 1);
    assert_eq!(scope.counters.unqueries(), 0);

    // Misses against the cached table do not re-query either.
    assert!(fwd.get_func(Category::Signature, "DSA", 1).is_none());
    assert_eq!(scope.counters.queries(), 1);
}

#[test]
fn test_non_cacheable_table_released_every_lookup() {
    let scope = MockScope::new(vec![(Category::Signature, signature_table())], false);
    let fwd = ForwardingProvider::init("default", &scope).expect("init failed");

    assert!(fwd.get_func(Category::Signature, "RSA", 1).is_some());
    assert!(fwd.get_func(Category::Signature, "RSA", 1).is_some());

    assert_eq!(scope.counters.queries(), 2);
    assert_eq!(scope.counters.unqueries(), 2);
}

#[test]
fn test_categories_cached_independently() {
    let scope = MockScope::new(
        vec![
            (Category::Signature, signature_table()),
            (Category::KeyExchange, Arc::from(vec![entry("ECDH", &[(1, "derive")])])),
        ],
        true,
    );
    let fwd = ForwardingProvider::init("default", &scope).expect("init failed");

    assert!(fwd.get_func(Category::Signature, "RSA", 1).is_some());
    assert!(fwd.get_func(Category::KeyExchange, "ECDH", 1).is_some());
    assert_eq!(scope.counters.queries(), 2);

    // A category the backend does not offer is queried each time; there is
    // nothing to cache.
    assert!(fwd.get_func(Category::AsymCipher, "RSA", 1).is_none());
    assert!(fwd.get_func(Category::AsymCipher, "RSA", 1).is_none());
    assert_eq!(scope.counters.queries(), 4);
}

#[test]
fn test_empty_algorithm_is_a_miss() {
    let scope = MockScope::new(vec![(Category::Signature, signature_table())], true);
    let fwd = ForwardingProvider::init("default", &scope).expect("init failed");

    assert!(fwd.get_func(Category::Signature, "", 1).is_none());
    assert_eq!(scope.counters.queries(), 0);
}

#[test]
fn test_dispatcher_name_mapping() {
    let keymgmt = Arc::from(vec![
        entry("RSA", &[(1, "km-rsa")]),
        entry("RSA-PSS", &[(1, "km-pss")]),
        entry("EC", &[(1, "km-ec")]),
    ]);
    let keyexch = Arc::from(vec![entry("ECDH", &[(1, "kx-ecdh")])]);
    let cipher = Arc::from(vec![entry("RSA", &[(1, "ac-rsa")])]);
    let scope = MockScope::new(
        vec![
            (Category::KeyManagement, keymgmt),
            (Category::KeyExchange, keyexch),
            (Category::AsymCipher, cipher),
            (Category::Signature, signature_table()),
        ],
        true,
    );
    let fwd = ForwardingProvider::init("default", &scope).expect("init failed");

    assert_eq!(label(&fwd.keymgmt_func(KeyType::Rsa, 1).unwrap()), "km-rsa");
    assert_eq!(
        label(&fwd.keymgmt_func(KeyType::RsaPss, 1).unwrap()),
        "km-pss"
    );
    // The same key type resolves under different canonical names per
    // category: "EC" for key management, "ECDSA" for signing.
    assert_eq!(label(&fwd.keymgmt_func(KeyType::Ec, 1).unwrap()), "km-ec");
    assert_eq!(
        label(&fwd.signature_func(KeyType::Ec, 1).unwrap()),
        "ec-sign"
    );
    assert_eq!(label(&fwd.keyexch_func(1).unwrap()), "kx-ecdh");
    assert_eq!(
        label(&fwd.asym_cipher_func(KeyType::Rsa, 1).unwrap()),
        "ac-rsa"
    );
}

#[test]
fn test_init_rejects_empty_name() {
    let scope = MockScope::new(vec![], true);
    let err = ForwardingProvider::init("", &scope).unwrap_err();
    assert_eq!(err, ProviderError::InvalidParameter);
    assert_eq!(scope.counters.queries(), 0);
}

#[test]
fn test_init_rejects_unloadable_backend() {
    let mut scope = MockScope::new(vec![], true);
    scope.fail_load = true;
    let err = ForwardingProvider::init("default", &scope).unwrap_err();
    assert_eq!(err, ProviderError::InvalidParameter);
}

#[test]
fn test_init_rejects_backend_without_context() {
    let mut scope = MockScope::new(vec![], true);
    scope.has_context = false;
    let err = ForwardingProvider::init("default", &scope).unwrap_err();
    assert_eq!(err, ProviderError::InvalidParameter);
}

#[test]
fn test_teardown() {
    let scope = MockScope::new(vec![(Category::Signature, signature_table())], true);
    let mut fwd = ForwardingProvider::init("default", &scope).expect("init failed");

    assert!(fwd.get_func(Category::Signature, "RSA", 1).is_some());
    fwd.teardown();

    assert!(fwd.backend().is_none());
    assert!(fwd.get_func(Category::Signature, "RSA", 1).is_none());
    assert_eq!(scope.counters.queries(), 1);

    fwd.teardown();
}
