// Copyright (C) Microsoft Corporation. All rights reserved.

//! Secure-element collaborator boundary.
//!
//! The hardware token's session/object protocol is an external collaborator:
//! this module declares the interface the provider consumes and nothing
//! more. Implementations wrap a PKCS#11 module (or a simulator in tests) and
//! keep its status-code discipline: every operation reports an [`Rv`] where
//! zero means success.

/// Slot identifier of a token.
pub type SlotId = u64;

/// Open session handle.
pub type SessionHandle = u64;

/// Handle of an object (key) held by the token.
pub type ObjectHandle = u64;

/// Mechanism identifier for sign/verify operations.
pub type MechanismType = u64;

/// Status code returned by secure-element operations; zero is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rv(pub u64);

impl Rv {
    /// The success status.
    pub const OK: Rv = Rv(0);
    /// Unspecified token failure.
    pub const GENERAL_ERROR: Rv = Rv(0x0005);
    /// The requested function failed.
    pub const FUNCTION_FAILED: Rv = Rv(0x0006);

    /// Whether the status signals success.
    pub fn is_ok(&self) -> bool {
        *self == Rv::OK
    }
}

/// One attribute of a token object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The attribute type identifier.
    pub kind: u64,
    /// The attribute value bytes.
    pub value: Vec<u8>,
}

/// The operations the provider requires from a secure element.
///
/// Sign and verify follow the incremental init/update/final protocol of the
/// token; one-shot variants take the whole input at once. Output-producing
/// calls use the size-query-then-fill convention: a `None` output buffer
/// returns the required length.
pub trait SecureElement: Send + Sync {
    /// Opens a session against `slot` and logs in with `pin`.
    fn open_session_login(&self, slot: SlotId, pin: &str) -> Result<SessionHandle, Rv>;

    /// Closes a session; closing an unknown session is a no-op.
    fn close_session(&self, session: SessionHandle);

    /// Searches objects by any combination of label, id and type.
    fn find_objects(
        &self,
        session: SessionHandle,
        label: Option<&str>,
        id: Option<&str>,
        object_type: Option<&str>,
    ) -> Result<Vec<ObjectHandle>, Rv>;

    /// Fetches all attributes of an object.
    fn fetch_attributes(
        &self,
        session: SessionHandle,
        object: ObjectHandle,
    ) -> Result<Vec<Attribute>, Rv>;

    /// Initializes a signing operation with `mechanism` and `key`.
    fn sign_init(
        &self,
        session: SessionHandle,
        mechanism: MechanismType,
        key: ObjectHandle,
    ) -> Result<(), Rv>;

    /// One-shot sign of `data`.
    fn sign(
        &self,
        session: SessionHandle,
        data: &[u8],
        signature: Option<&mut [u8]>,
    ) -> Result<usize, Rv>;

    /// Feeds a chunk of data into an initialized signing operation.
    fn sign_update(&self, session: SessionHandle, data: &[u8]) -> Result<(), Rv>;

    /// Finalizes an incremental signing operation.
    fn sign_final(
        &self,
        session: SessionHandle,
        signature: Option<&mut [u8]>,
    ) -> Result<usize, Rv>;

    /// Initializes a verification operation with `mechanism` and `key`.
    fn verify_init(
        &self,
        session: SessionHandle,
        mechanism: MechanismType,
        key: ObjectHandle,
    ) -> Result<(), Rv>;

    /// One-shot verification of `signature` over `data`.
    fn verify(&self, session: SessionHandle, data: &[u8], signature: &[u8]) -> Result<(), Rv>;

    /// Feeds a chunk of data into an initialized verification operation.
    fn verify_update(&self, session: SessionHandle, data: &[u8]) -> Result<(), Rv>;

    /// Finalizes an incremental verification against `signature`.
    fn verify_final(&self, session: SessionHandle, signature: &[u8]) -> Result<(), Rv>;
}
