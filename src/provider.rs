// Copyright (C) Microsoft Corporation. All rights reserved.

//! Provider context glue.
//!
//! Composes the pieces a loaded provider instance consists of: the core
//! context, the host-supplied configuration, and the forwarding provider.
//! The host-framework registration boilerplate (dispatch-table export,
//! parameter tables) lives with the embedding module, not here.

use std::sync::Arc;

use crate::fwd::ForwardingProvider;
use crate::host::{CoreContext, CoreHandle, HostDispatch};
use crate::{put_error, ProviderError};

/// The provider's registered name.
pub const PROVIDER_NAME: &str = "pkcs11sign";

/// The provider's human-readable description.
pub const PROVIDER_DESCRIPTION: &str = "PKCS11 signing key provider";

/// The provider's version string.
pub const PROVIDER_VERSION: &str = env!("CARGO_PKG_VERSION");

const PARAM_MODULE_PATH: &str = "pkcs11sign-module-path";
const PARAM_MODULE_INIT_ARGS: &str = "pkcs11sign-module-init-args";
const PARAM_FWD: &str = "pkcs11sign-forward";

/// Host-supplied provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Path of the PKCS#11 module implementing the secure element.
    pub module_path: Option<String>,
    /// Initialization arguments for the PKCS#11 module.
    pub module_init_args: Option<String>,
    /// Name of the default backend to forward to.
    pub forward: String,
}

impl ProviderConfig {
    /// Fetches the configuration through the core context's parameter
    /// callback.
    ///
    /// A `provider=` prefix on the forward name is accepted and stripped.
    ///
    /// # Errors
    ///
    /// * [`ProviderError::InternalError`] - the host supplied no parameter
    ///   query callback
    /// * [`ProviderError::MissingParameter`] - no forward backend is
    ///   configured
    pub fn from_core(core: &CoreContext) -> Result<Self, ProviderError> {
        if !core.has_get_params() {
            put_error!(
                core,
                ProviderError::InternalError,
                "failed to get configured parameters"
            );
            return Err(ProviderError::InternalError);
        }

        let module_path = core.get_param(PARAM_MODULE_PATH);
        let module_init_args = core.get_param(PARAM_MODULE_INIT_ARGS);
        let forward = core.get_param(PARAM_FWD).ok_or_else(|| {
            put_error!(
                core,
                ProviderError::MissingParameter,
                "no forward backend configured"
            );
            ProviderError::MissingParameter
        })?;
        let forward = forward
            .strip_prefix("provider=")
            .unwrap_or(&forward)
            .to_string();

        tracing::debug!(?module_path, ?module_init_args, %forward, "configuration");

        Ok(Self {
            module_path,
            module_init_args,
            forward,
        })
    }
}

/// A fully initialized provider instance.
#[derive(Debug)]
pub struct ProviderContext {
    core: CoreContext,
    fwd: ForwardingProvider,
    config: ProviderConfig,
}

impl ProviderContext {
    /// Initializes a provider instance from the host handle and dispatch
    /// table.
    ///
    /// Initializes the core context, fetches the configuration, and loads
    /// the configured forward backend into the isolated scope. Any partially
    /// constructed state is torn down before a failure is returned.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`CoreContext::init`],
    /// [`ProviderConfig::from_core`] and [`ForwardingProvider::init`].
    pub fn init(
        handle: Arc<dyn CoreHandle>,
        dispatch: &[HostDispatch],
    ) -> Result<Self, ProviderError> {
        tracing::info!(provider = PROVIDER_NAME, version = PROVIDER_VERSION, "init");

        let mut core = CoreContext::init(handle, dispatch)?;

        let config = match ProviderConfig::from_core(&core) {
            Ok(config) => config,
            Err(err) => {
                core.teardown();
                return Err(err);
            }
        };

        let fwd = match core
            .scope()
            .ok_or(ProviderError::InternalError)
            .and_then(|scope| ForwardingProvider::init(&config.forward, scope))
        {
            Ok(fwd) => fwd,
            Err(err) => {
                put_error!(
                    core,
                    err,
                    "failed to initialize forward {}",
                    config.forward
                );
                core.teardown();
                return Err(err);
            }
        };

        Ok(Self { core, fwd, config })
    }

    /// The core context.
    pub fn core(&self) -> &CoreContext {
        &self.core
    }

    /// The forwarding provider.
    pub fn fwd(&self) -> &ForwardingProvider {
        &self.fwd
    }

    /// The host-supplied configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Tears down the forwarding provider and the core context.
    ///
    /// Idempotent.
    pub fn teardown(&mut self) {
        self.fwd.teardown();
        self.core.teardown();
    }
}
