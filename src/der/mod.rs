// Copyright (C) Microsoft Corporation. All rights reserved.

//! DER encoding of raw ECDSA signatures.
//!
//! A secure element returns an ECDSA signature as the fixed-width
//! concatenation `r || s` of two big-endian integers of the curve's order
//! size. General-purpose verifiers expect the ASN.1 ECDSA-Sig-Value encoding
//! defined in RFC 3279:
//!
//! ```text
//! ECDSA-Sig-Value ::= SEQUENCE {
//!   r  INTEGER,
//!   s  INTEGER
//! }
//! ```
//!
//! [`DerEcdsaSignature`] performs that conversion. Only the raw-to-DER
//! direction is provided; the forwarding path never decodes standard
//! signatures back to raw form.

use crate::ProviderError;

/// ASN.1 structure for ECDSA signatures (RFC 3279 ECDSA-Sig-Value).
#[derive(asn1::Asn1Read, asn1::Asn1Write)]
struct EcSignature {
    r: asn1::OwnedBigInt,
    s: asn1::OwnedBigInt,
}

/// An ECDSA signature split into its two components, ready for DER encoding.
///
/// The component width is taken from the raw input, not from a curve
/// parameter: the signing device reports the order size implicitly through
/// the signature length.
#[derive(Debug)]
pub struct DerEcdsaSignature {
    r: Vec<u8>,
    s: Vec<u8>,
}

impl DerEcdsaSignature {
    /// Splits a raw signature `r || s` into its components.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidParameter`] if `raw` is empty or of
    /// odd length (the two components must have equal width). Nothing is
    /// allocated on the failure path.
    pub fn from_raw(raw: &[u8]) -> Result<Self, ProviderError> {
        if raw.is_empty() || raw.len() % 2 != 0 {
            return Err(ProviderError::InvalidParameter);
        }

        let (r, s) = raw.split_at(raw.len() / 2);
        Ok(Self {
            r: r.to_vec(),
            s: s.to_vec(),
        })
    }

    /// Returns the r component, at the raw signature's fixed width.
    pub fn r(&self) -> &[u8] {
        &self.r
    }

    /// Returns the s component, at the raw signature's fixed width.
    pub fn s(&self) -> &[u8] {
        &self.s
    }

    /// Encodes the signature to DER format.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Optional output buffer. If `None`, only calculates the
    ///   required size.
    ///
    /// # Returns
    ///
    /// Returns the number of bytes written (or required if `bytes` is
    /// `None`). Callers size a buffer with one call and fill it with the
    /// next; a too-small buffer fails without partial writes.
    ///
    /// # Errors
    ///
    /// * [`ProviderError::EncodeFailed`] - Failed to encode the ASN.1
    ///   structure
    /// * [`ProviderError::BufferTooSmall`] - Output buffer is too small
    pub fn to_der(&self, bytes: Option<&mut [u8]>) -> Result<usize, ProviderError> {
        let sig = EcSignature {
            r: to_bigint(&self.r)?,
            s: to_bigint(&self.s)?,
        };

        let der = asn1::write_single(&sig).map_err(|_| ProviderError::EncodeFailed)?;

        if let Some(bytes) = bytes {
            if bytes.len() < der.len() {
                return Err(ProviderError::BufferTooSmall);
            }
            bytes[..der.len()].copy_from_slice(&der);
        }

        Ok(der.len())
    }

    /// Encodes the signature to a DER-encoded vector.
    ///
    /// Convenience over [`DerEcdsaSignature::to_der`] for callers that can
    /// accept ownership of the result.
    pub fn to_der_vec(&self) -> Result<Vec<u8>, ProviderError> {
        let der_len = self.to_der(None)?;
        let mut der_bytes = vec![0u8; der_len];
        self.to_der(Some(&mut der_bytes))?;
        Ok(der_bytes)
    }
}

/// Converts a fixed-width big-endian component to an ASN.1 integer:
/// leading zeros are stripped and a zero byte is prepended when the high bit
/// is set, so the value is not read back as negative.
fn to_bigint(bytes: &[u8]) -> Result<asn1::OwnedBigInt, ProviderError> {
    let bytes = match bytes.iter().position(|&b| b != 0) {
        Some(pos) => &bytes[pos..],
        // An all-zero component is the single-byte INTEGER 0.
        None => &bytes[bytes.len().saturating_sub(1)..],
    };

    let needs_padding = bytes.first().is_some_and(|&b| b & 0x80 == 0x80);

    let mut vec = Vec::with_capacity(bytes.len() + needs_padding as usize);
    if needs_padding {
        vec.push(0);
    }
    vec.extend_from_slice(bytes);

    asn1::OwnedBigInt::new(vec).ok_or(ProviderError::EncodeFailed)
}
