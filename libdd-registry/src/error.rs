// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors reported by [`Registry`](crate::Registry) operations.
///
/// Every variant carries the offending key so callers can branch on kind
/// and still report which binding was involved.
#[derive(Clone, Debug, Error, Eq, Hash, PartialEq)]
pub enum Error {
    /// `register` was called for a key that is already bound. Registration
    /// is insert-only; there is no overwrite path.
    #[error("key '{0}' is already registered")]
    DuplicateKey(String),

    /// `get` or `spawn` was called for a key that was never registered.
    #[error("no entry registered for key '{0}'")]
    NotFound(String),

    /// `spawn` was called for a key that was registered as a direct value,
    /// so there is no constructor to re-invoke.
    #[error("entry '{0}' was registered as a value and has no constructor")]
    NoConstructor(String),

    /// An entry was built with neither a constructor nor an instance.
    #[error("entry '{0}' must provide a constructor or an instance")]
    InvalidPayload(String),
}
