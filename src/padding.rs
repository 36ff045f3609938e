// Copyright (C) Microsoft Corporation. All rights reserved.

//! RSA padding-name parsing.

/// RSA padding modes recognized by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaPadding {
    /// No padding.
    None,
    /// PKCS#1 v1.5 padding.
    Pkcs1,
    /// OAEP padding.
    Oaep,
    /// ANSI X9.31 padding.
    X931,
    /// PSS padding.
    Pss,
}

impl RsaPadding {
    /// Parses a standard padding mode name.
    ///
    /// Returns `None` for anything outside the recognized set; the caller
    /// reports that as an invalid padding.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "none" => Some(RsaPadding::None),
            "pkcs1" => Some(RsaPadding::Pkcs1),
            "oaep" => Some(RsaPadding::Oaep),
            "x931" => Some(RsaPadding::X931),
            "pss" => Some(RsaPadding::Pss),
            _ => None,
        }
    }
}
