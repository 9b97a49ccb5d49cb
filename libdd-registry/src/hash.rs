// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! 32-bit FNV-1a key hashing.

/// Hashes a key using 32-bit FNV-1a.
///
/// This is a pure function with no shared state, so it is safe to call
/// reentrantly (during table growth, or from a constructor that resolves
/// dependencies while another hash is conceptually "in flight"). The result
/// is deterministic within a process run, which is all the probe sequence
/// requires.
#[inline]
pub(crate) fn fnv1a_32(key: &str) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for &b in key.as_bytes() {
        h ^= u32::from(b);
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}
