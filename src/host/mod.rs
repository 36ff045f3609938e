// Copyright (C) Microsoft Corporation. All rights reserved.

//! Host framework boundary: core context and error bridge.
//!
//! A [`CoreContext`] is created once per loaded provider instance from a host
//! handle and the host's dispatch record list. It owns the isolated library
//! scope in which every object this provider creates must live, and it
//! captures the subset of host diagnostic callbacks the host chose to supply.
//!
//! Error reporting is capability-based: each of the host callbacks may be
//! absent, and [`CoreContext::put_error`] invokes exactly the ones that are
//! present. The [`REASON_STRINGS`] table is the descriptive metadata the host
//! registers for the provider's reason codes.

use std::fmt;
use std::sync::Arc;

use crate::fwd::Backend;
use crate::ProviderError;

/// Host reason-code strings, indexed by [`ProviderError::reason_code`]
/// values, for registration with the host's error-description mechanism.
pub const REASON_STRINGS: &[(u32, &str)] = &[
    (1, "Internal error"),
    (2, "Memory allocation failed"),
    (3, "Invalid parameter encountered"),
    (4, "A function inherited from default provider is missing"),
    (5, "A function inherited from default provider has failed"),
    (6, "An operation context has not been initialized"),
    (7, "A parameter of a key or a context is missing"),
    (8, "An invalid or unknown padding is used"),
    (9, "An invalid or unknown digest is used"),
    (10, "An invalid salt length is used"),
    (11, "A secure key function has failed"),
];

/// Host callback answering a configuration parameter query by name.
pub type GetParamsFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Host callback opening a new error slot in the diagnostic channel.
pub type NewErrorFn = Arc<dyn Fn() + Send + Sync>;

/// Host callback recording the source location (file, line) of an error.
pub type SetErrorLocationFn = Arc<dyn Fn(&str, u32) + Send + Sync>;

/// Host callback recording the reason code and formatted message of an error.
pub type SetErrorMessageFn = Arc<dyn Fn(u32, &str) + Send + Sync>;

/// One record of the host dispatch table supplied at provider load.
///
/// The host hands the provider an ordered sequence of these; the provider
/// consumes the four recognized callbacks and ignores everything else, so
/// hosts may extend their tables without breaking older providers.
#[derive(Clone)]
pub enum HostDispatch {
    /// Configuration parameter query.
    GetParams(GetParamsFn),
    /// Open a new error slot.
    NewError(NewErrorFn),
    /// Record the source location of the current error.
    SetErrorLocation(SetErrorLocationFn),
    /// Record the reason code and message of the current error.
    SetErrorMessage(SetErrorMessageFn),
    /// A host function this provider does not consume, identified by the
    /// host's numeric function id.
    Other(u32),
}

/// Opaque handle into the host framework.
///
/// Not owned by the provider; the only capability the provider exercises is
/// creating the isolated child scope its objects live in.
pub trait CoreHandle: Send + Sync {
    /// Creates a child library scope bound to this handle.
    ///
    /// Returns `None` if the host cannot create the scope.
    fn new_child_scope(&self, dispatch: &[HostDispatch]) -> Option<Box<dyn LibScope>>;
}

/// Isolated child library scope.
///
/// All backend loading happens through the scope, bounding the lifetime and
/// visibility of everything the provider creates: dropping the scope must not
/// leak provider objects into the host's global state.
pub trait LibScope: Send + Sync {
    /// Loads the named default backend into this scope.
    ///
    /// Returns `None` if no backend with that name can be loaded.
    fn load_backend(&self, name: &str) -> Option<Box<dyn Backend>>;
}

/// The host diagnostic callback capability set.
///
/// Every member may be absent; call sites branch on presence.
#[derive(Clone, Default)]
struct CoreCallbacks {
    get_params: Option<GetParamsFn>,
    new_error: Option<NewErrorFn>,
    set_error_location: Option<SetErrorLocationFn>,
    set_error_message: Option<SetErrorMessageFn>,
}

/// Per-instance host state: the isolated library scope and the captured
/// host callbacks.
pub struct CoreContext {
    handle: Option<Arc<dyn CoreHandle>>,
    scope: Option<Box<dyn LibScope>>,
    fns: CoreCallbacks,
}

impl fmt::Debug for CoreContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreContext").finish_non_exhaustive()
    }
}

impl CoreContext {
    /// Initializes the core context from the host handle and dispatch table.
    ///
    /// Creates the isolated child scope and captures the recognized host
    /// callbacks from `dispatch`; unrecognized records are ignored. When the
    /// same callback appears more than once, the last occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::AllocationFailed`] if the host cannot create
    /// the child scope.
    pub fn init(
        handle: Arc<dyn CoreHandle>,
        dispatch: &[HostDispatch],
    ) -> Result<Self, ProviderError> {
        let scope = handle.new_child_scope(dispatch).ok_or_else(|| {
            tracing::error!("failed to create child library scope");
            ProviderError::AllocationFailed
        })?;

        let mut fns = CoreCallbacks::default();
        for entry in dispatch {
            match entry {
                HostDispatch::GetParams(f) => fns.get_params = Some(f.clone()),
                HostDispatch::NewError(f) => fns.new_error = Some(f.clone()),
                HostDispatch::SetErrorLocation(f) => fns.set_error_location = Some(f.clone()),
                HostDispatch::SetErrorMessage(f) => fns.set_error_message = Some(f.clone()),
                HostDispatch::Other(_) => continue,
            }
        }

        Ok(Self {
            handle: Some(handle),
            scope: Some(scope),
            fns,
        })
    }

    /// Releases the isolated scope and clears all captured callbacks.
    ///
    /// Idempotent; reporting through a torn-down context is a no-op.
    pub fn teardown(&mut self) {
        self.scope = None;
        self.handle = None;
        self.fns = CoreCallbacks::default();
    }

    /// The isolated scope, if the context has not been torn down.
    pub fn scope(&self) -> Option<&dyn LibScope> {
        self.scope.as_deref()
    }

    /// The host handle, if the context has not been torn down.
    pub fn handle(&self) -> Option<&Arc<dyn CoreHandle>> {
        self.handle.as_ref()
    }

    /// Queries a host configuration parameter by name.
    ///
    /// Returns `None` when the host did not supply the query callback or has
    /// no value configured under `key`; [`ProviderConfig`] distinguishes the
    /// two cases via [`CoreContext::has_get_params`].
    ///
    /// [`ProviderConfig`]: crate::ProviderConfig
    pub fn get_param(&self, key: &str) -> Option<String> {
        self.fns.get_params.as_ref().and_then(|f| f(key))
    }

    /// Whether the host supplied the configuration query callback.
    pub fn has_get_params(&self) -> bool {
        self.fns.get_params.is_some()
    }

    /// Reports an error into the host's diagnostic channel.
    ///
    /// Invokes, in order, each callback the host supplied: open a new error
    /// slot, record the caller's source location, record the reason code and
    /// formatted message. Each call is independently optional; a context with
    /// no callbacks (or one that was torn down) reports nothing.
    #[track_caller]
    pub fn put_error(&self, err: &ProviderError, args: fmt::Arguments<'_>) {
        let location = std::panic::Location::caller();

        if let Some(new_error) = &self.fns.new_error {
            new_error();
        }
        if let Some(set_location) = &self.fns.set_error_location {
            set_location(location.file(), location.line());
        }
        if let Some(set_message) = &self.fns.set_error_message {
            set_message(err.reason_code(), &args.to_string());
        }
    }
}

/// Traces an error and reports it through the core context in one step.
///
/// ```ignore
/// put_error!(core, ProviderError::InternalError, "failed to load {}", name);
/// ```
#[macro_export]
macro_rules! put_error {
    ($core:expr, $err:expr, $($arg:tt)+) => {{
        ::tracing::error!($($arg)+);
        $core.put_error(&$err, ::std::format_args!($($arg)+));
    }};
}
