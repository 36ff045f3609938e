// Copyright (C) Microsoft Corporation. All rights reserved.

//! Forwarding to the default backend.
//!
//! A [`ForwardingProvider`] loads a named default backend inside the core
//! context's isolated scope and resolves per-algorithm functions out of the
//! backend's operation tables. Lookups are cached per operation category when
//! the backend permits it, so the steady state of a delegated call is a read
//! of an owned table plus an alias scan.
//!
//! A failed lookup is not an error: it means the algorithm is not available
//! via forwarding, and the operation layer above decides what that implies
//! for the request.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::host::LibScope;
use crate::ProviderError;

/// Operation categories whose algorithm tables are queried independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Key management (import/export/generation plumbing).
    KeyManagement,
    /// Key exchange (ECDH).
    KeyExchange,
    /// Asymmetric cipher (RSA encrypt/decrypt).
    AsymCipher,
    /// Signature (RSA, RSA-PSS, ECDSA).
    Signature,
}

impl Category {
    /// Number of categories; sizes the per-provider cache.
    pub const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            Category::KeyManagement => 0,
            Category::KeyExchange => 1,
            Category::AsymCipher => 2,
            Category::Signature => 3,
        }
    }
}

/// Key types recognized by the operation dispatchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// RSA key.
    Rsa,
    /// RSA key restricted to PSS usage.
    RsaPss,
    /// Elliptic-curve key.
    Ec,
}

/// An opaque callable resolved from the default backend.
///
/// The handle is type-erased; the operation layer that requested a specific
/// function id downcasts it back to the callable type it expects. Clones
/// share the underlying callable, so [`FwdFunc::ptr_eq`] identifies functions
/// resolved from the same table entry. A handle is only valid while the
/// [`ForwardingProvider`] that produced it remains loaded.
#[derive(Clone)]
pub struct FwdFunc(Arc<dyn Any + Send + Sync>);

impl FwdFunc {
    /// Wraps a callable into an opaque handle.
    pub fn new<F: Any + Send + Sync>(func: F) -> Self {
        Self(Arc::new(func))
    }

    /// Recovers the concrete callable type, if `F` is what was wrapped.
    pub fn downcast_ref<F: Any>(&self) -> Option<&F> {
        self.0.downcast_ref()
    }

    /// Whether both handles refer to the same underlying callable.
    pub fn ptr_eq(&self, other: &FwdFunc) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FwdFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FwdFunc({:p})", Arc::as_ptr(&self.0))
    }
}

/// One function record of an algorithm's implementation table.
#[derive(Debug, Clone)]
pub struct FwdDispatch {
    /// The backend's numeric function id.
    pub function_id: u32,
    /// The callable registered under that id.
    pub function: FwdFunc,
}

impl FwdDispatch {
    /// Creates a function record.
    pub fn new(function_id: u32, function: FwdFunc) -> Self {
        Self {
            function_id,
            function,
        }
    }
}

/// One algorithm of a backend operation table.
#[derive(Debug, Clone)]
pub struct AlgorithmEntry {
    /// Colon-delimited algorithm name aliases, e.g. `"RSA:rsaEncryption"`.
    pub names: String,
    /// The ordered implementation table for this algorithm.
    pub implementation: Vec<FwdDispatch>,
}

impl AlgorithmEntry {
    /// Creates an algorithm entry.
    pub fn new(names: impl Into<String>, implementation: Vec<FwdDispatch>) -> Self {
        Self {
            names: names.into(),
            implementation,
        }
    }
}

/// A backend operation table: the algorithms offered for one category.
pub type AlgorithmTable = Arc<[AlgorithmEntry]>;

/// A loaded default backend.
///
/// Unloading is dropping the boxed backend.
pub trait Backend: Send + Sync {
    /// The backend's identifier.
    fn name(&self) -> &str;

    /// The backend's own context, passed into delegated calls.
    ///
    /// A backend exposing no usable context cannot be forwarded to.
    fn context(&self) -> Option<&(dyn Any + Send + Sync)>;

    /// Queries the algorithm table for one operation category.
    ///
    /// The boolean is the backend's cacheable flag: when `true` the caller
    /// may retain the table; when `false` the table must be handed back via
    /// [`Backend::unquery_operation`] after a single use and never stored.
    fn query_operation(&self, category: Category) -> Option<(AlgorithmTable, bool)>;

    /// Releases a non-cacheable table obtained from
    /// [`Backend::query_operation`].
    fn unquery_operation(&self, category: Category, table: AlgorithmTable);
}

/// The forwarding provider: a loaded backend plus the per-category
/// algorithm-table cache.
///
/// The cache is owned by the instance, so multiple providers forwarding to
/// different backends never interfere. Lookups are safe for concurrent use;
/// population is first-writer-wins, which is sound because every query for
/// the same category returns an equivalent table.
pub struct ForwardingProvider {
    name: String,
    backend: Option<Box<dyn Backend>>,
    alg_cache: RwLock<[Option<AlgorithmTable>; Category::COUNT]>,
}

impl fmt::Debug for ForwardingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingProvider")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ForwardingProvider {
    /// Loads the named backend inside `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidParameter`] if the name is empty, the
    /// backend cannot be loaded, or the backend exposes no usable context.
    pub fn init(name: &str, scope: &dyn LibScope) -> Result<Self, ProviderError> {
        if name.is_empty() {
            return Err(ProviderError::InvalidParameter);
        }

        let backend = scope.load_backend(name).ok_or_else(|| {
            tracing::error!(name, "failed to load backend");
            ProviderError::InvalidParameter
        })?;

        if backend.context().is_none() {
            tracing::error!(name, "backend exposes no usable context");
            return Err(ProviderError::InvalidParameter);
        }

        Ok(Self {
            name: name.to_string(),
            backend: Some(backend),
            alg_cache: RwLock::new([None, None, None, None]),
        })
    }

    /// The configured backend identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The loaded backend, if the provider has not been torn down.
    pub fn backend(&self) -> Option<&dyn Backend> {
        self.backend.as_deref()
    }

    /// Unloads the backend and invalidates all cached tables.
    ///
    /// Idempotent; lookups on a torn-down provider are misses.
    pub fn teardown(&mut self) {
        // Cached tables must not outlive the backend that produced them.
        *self.alg_cache.write() = [None, None, None, None];
        self.backend = None;
    }

    /// Resolves a function from the backend's table for `category`.
    ///
    /// The algorithm name must match one alias of an entry as a complete,
    /// case-insensitive token of the entry's colon-delimited alias list; the
    /// first matching entry is scanned for `function_id`. A miss at any step
    /// returns `None`: the algorithm is simply not available via forwarding.
    ///
    /// Tables the backend marks cacheable are retained for the lifetime of
    /// the provider; all others are handed back immediately after the scan.
    pub fn get_func(
        &self,
        category: Category,
        algorithm: &str,
        function_id: u32,
    ) -> Option<FwdFunc> {
        let backend = self.backend.as_deref()?;
        if algorithm.is_empty() {
            return None;
        }

        tracing::debug!(?category, algorithm, function_id, "forward lookup");

        if let Some(table) = self.alg_cache.read()[category.index()].clone() {
            let func = Self::scan_table(&table, algorithm, function_id);
            tracing::debug!(?func, "forward lookup (cached)");
            return func;
        }

        let (table, cacheable) = backend.query_operation(category)?;
        let func = Self::scan_table(&table, algorithm, function_id);
        tracing::debug!(?func, cacheable, "forward lookup (queried)");

        if cacheable {
            let mut cache = self.alg_cache.write();
            let slot = &mut cache[category.index()];
            // A lost population race drops the duplicate; tables for the
            // same category are equivalent.
            if slot.is_none() {
                *slot = Some(table);
            }
        } else {
            backend.unquery_operation(category, table);
        }

        func
    }

    /// Key-management function lookup for `key_type`.
    pub fn keymgmt_func(&self, key_type: KeyType, function_id: u32) -> Option<FwdFunc> {
        self.get_func(
            Category::KeyManagement,
            algo_name(key_type, false)?,
            function_id,
        )
    }

    /// Key-exchange function lookup; always resolves `"ECDH"`.
    pub fn keyexch_func(&self, function_id: u32) -> Option<FwdFunc> {
        self.get_func(Category::KeyExchange, "ECDH", function_id)
    }

    /// Asymmetric-cipher function lookup for `key_type`.
    pub fn asym_cipher_func(&self, key_type: KeyType, function_id: u32) -> Option<FwdFunc> {
        self.get_func(
            Category::AsymCipher,
            algo_name(key_type, false)?,
            function_id,
        )
    }

    /// Signature function lookup for `key_type`.
    ///
    /// Elliptic-curve keys resolve to `"ECDSA"` here, not `"EC"`: signing
    /// and key management use different canonical names for the same key
    /// type.
    pub fn signature_func(&self, key_type: KeyType, function_id: u32) -> Option<FwdFunc> {
        self.get_func(Category::Signature, algo_name(key_type, true)?, function_id)
    }

    fn scan_table(table: &[AlgorithmEntry], algorithm: &str, function_id: u32) -> Option<FwdFunc> {
        let entry = table.iter().find(|e| names_match(&e.names, algorithm))?;
        entry
            .implementation
            .iter()
            .find(|d| d.function_id == function_id)
            .map(|d| d.function.clone())
    }
}

/// Canonical algorithm name for a key type.
///
/// `Option` keeps key types added in the future lookup misses rather than
/// errors.
fn algo_name(key_type: KeyType, sign: bool) -> Option<&'static str> {
    match key_type {
        KeyType::Rsa => Some("RSA"),
        KeyType::RsaPss => Some("RSA-PSS"),
        KeyType::Ec => Some(if sign { "ECDSA" } else { "EC" }),
    }
}

/// Whether `algorithm` occurs as a complete token of the colon-delimited
/// alias list `names`, compared case-insensitively.
///
/// Token boundaries matter: `"RSA"` must not match inside `"RSA-PSS"`.
/// Empty or malformed alias lists never match.
fn names_match(names: &str, algorithm: &str) -> bool {
    names
        .split(':')
        .any(|token| token.eq_ignore_ascii_case(algorithm))
}

#[cfg(test)]
mod tests;
