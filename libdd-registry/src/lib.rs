// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lazy service registry.
//!
//! A [`Registry`] maps string keys to services. A key is bound either to a
//! ready-made value or to a constructor closure; the first [`Registry::get`]
//! for a constructor-bound key runs the constructor once and caches the
//! result, and every later `get` hands out the same shared instance.
//! [`Registry::spawn`] forces re-construction and replaces the cached
//! instance.
//!
//! Storage is a purpose-built open-addressing hash table with a perturbed
//! probe sequence (`table.rs`). The table is append-only: keys are never
//! removed, and a failed registration leaves the table untouched.
//!
//! The registry is single-threaded by design: it uses `Rc` and `RefCell`,
//! takes no locks, and is not `Send` or `Sync`. Constructors receive the
//! registry itself and may call back into it to resolve dependencies;
//! cyclic constructor dependencies are not detected and recurse until one
//! side finds a cached instance or the call stack is exhausted.

mod error;
mod hash;
mod registry;
mod table;

pub use error::Error;
pub use registry::{Constructor, Payload, Registry};
