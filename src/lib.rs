// Copyright (C) Microsoft Corporation. All rights reserved.

//! Forwarding core for a PKCS#11 signing key provider.
//!
//! This crate implements the dispatch layer of a provider that keeps private
//! keys inside a hardware security token: signing requests are routed to the
//! secure element, while every other operation on the same key types is
//! delegated to an already-loaded, fully-featured default backend. It
//! includes support for:
//!
//! - **Core context**: per-instance host state with an isolated library
//!   scope and the host's diagnostic callback capability set
//! - **Forwarding provider**: cached, name-resolved function lookup against
//!   the default backend for four operation categories
//! - **Operation dispatchers**: key-management, key-exchange, asymmetric
//!   cipher and signature lookups keyed by key type
//! - **DER**: raw ECDSA signature to `ECDSA-Sig-Value` encoding
//! - **Padding**: RSA padding-name parsing
//!
//! The secure-element session/object protocol itself is an external
//! collaborator; only its boundary is declared here (see [`pkcs11`]).

mod der;
mod fwd;
mod host;
mod padding;
pub mod pkcs11;
mod provider;

pub use der::*;
pub use host::*;
pub use fwd::*;
pub use padding::*;
pub use provider::*;
use thiserror::Error;

/// Error type for all provider operations.
///
/// The first eleven variants form the closed reason-code set reported to the
/// host's diagnostic channel (see [`REASON_STRINGS`]); the remaining variants
/// are codec failures that map onto that set via [`ProviderError::reason_code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Internal error.
    #[error("internal error")]
    InternalError,

    /// Memory allocation failed.
    #[error("memory allocation failed")]
    AllocationFailed,

    /// Invalid parameter encountered.
    #[error("invalid parameter encountered")]
    InvalidParameter,

    /// A function inherited from the default backend is missing.
    #[error("a function inherited from the default provider is missing")]
    FwdFunctionMissing,

    /// A function inherited from the default backend has failed.
    #[error("a function inherited from the default provider has failed")]
    FwdFunctionFailed,

    /// An operation context has not been initialized.
    #[error("an operation context has not been initialized")]
    OperationNotInitialized,

    /// A parameter of a key or a context is missing.
    #[error("a parameter of a key or a context is missing")]
    MissingParameter,

    /// An invalid or unknown padding is used.
    #[error("an invalid or unknown padding is used")]
    InvalidPadding,

    /// An invalid or unknown digest is used.
    #[error("an invalid or unknown digest is used")]
    InvalidDigest,

    /// An invalid salt length is used.
    #[error("an invalid salt length is used")]
    InvalidSaltLength,

    /// A secure key function has failed.
    #[error("a secure key function has failed")]
    SecureKeyFunctionFailed,

    /// Output buffer is too small for the encoded result.
    #[error("output buffer too small")]
    BufferTooSmall,

    /// DER encoding failed.
    #[error("DER encoding failed")]
    EncodeFailed,
}

impl ProviderError {
    /// Maps the error onto the closed reason-code set registered with the
    /// host (see [`REASON_STRINGS`]).
    ///
    /// Codec-specific failures fold into the nearest registered reason:
    /// [`ProviderError::BufferTooSmall`] reports as an invalid parameter and
    /// [`ProviderError::EncodeFailed`] as an internal error.
    pub fn reason_code(&self) -> u32 {
        match self {
            ProviderError::InternalError => 1,
            ProviderError::AllocationFailed => 2,
            ProviderError::InvalidParameter => 3,
            ProviderError::FwdFunctionMissing => 4,
            ProviderError::FwdFunctionFailed => 5,
            ProviderError::OperationNotInitialized => 6,
            ProviderError::MissingParameter => 7,
            ProviderError::InvalidPadding => 8,
            ProviderError::InvalidDigest => 9,
            ProviderError::InvalidSaltLength => 10,
            ProviderError::SecureKeyFunctionFailed => 11,
            ProviderError::BufferTooSmall => 3,
            ProviderError::EncodeFailed => 1,
        }
    }
}
