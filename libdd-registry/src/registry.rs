// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lazy binding layer over the probe table.

use crate::error::Error;
use crate::hash::fnv1a_32;
use crate::table::{Entry, Table};
use std::cell::RefCell;
use std::rc::Rc;

/// A factory for one service. Receives the registry so it can resolve
/// dependencies by calling [`Registry::get`] on other keys.
pub type Constructor<T> = Rc<dyn Fn(&Registry<T>) -> T>;

/// What a key is bound to at registration time.
///
/// The binding kind is decided here, explicitly, by the caller -- there is
/// no runtime inspection of the payload later on.
pub enum Payload<T> {
    /// A ready-made instance; [`Registry::get`] hands it out as-is and
    /// [`Registry::spawn`] refuses it.
    Value(T),
    /// A factory invoked lazily on first [`Registry::get`] and re-invoked
    /// by every [`Registry::spawn`].
    Constructor(Constructor<T>),
}

impl<T> Payload<T> {
    /// Wraps a closure as a constructor payload.
    pub fn constructor(f: impl Fn(&Registry<T>) -> T + 'static) -> Self {
        Payload::Constructor(Rc::new(f))
    }
}

/// A lazy service registry.
///
/// Keys are registered once ([`register`](Self::register)) and resolved any
/// number of times ([`get`](Self::get), [`spawn`](Self::spawn)). Instances
/// are handed out as shared `Rc`s; callers must not assume exclusive
/// ownership.
///
/// Single-threaded: the registry is not `Send` or `Sync`, takes no locks,
/// and callers needing concurrent access must serialize externally.
/// Constructors may call back into the registry; a cyclic constructor
/// dependency recurses until one side finds a cached instance or the call
/// stack is exhausted, which is the caller's responsibility to avoid.
pub struct Registry<T> {
    table: RefCell<Table<T>>,
}

impl<T> Registry<T> {
    /// Creates a registry with the default initial capacity (64 slots).
    pub fn new() -> Self {
        Self {
            table: RefCell::new(Table::with_hint(None)),
        }
    }

    /// Creates a registry sized for roughly `hint` registrations.
    ///
    /// Hints below 6 fall back to the minimum table size; larger hints
    /// reserve 1.5x headroom so early registrations do not immediately
    /// trigger growth. The resulting capacity is always a power of two.
    pub fn with_hint(hint: u32) -> Self {
        Self {
            table: RefCell::new(Table::with_hint(Some(hint))),
        }
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current slot capacity of the underlying table.
    pub fn capacity(&self) -> usize {
        self.table.borrow().capacity()
    }

    /// Returns `true` if `key` has been registered.
    pub fn contains(&self, key: &str) -> bool {
        self.table.borrow().lookup(fnv1a_32(key), key).is_some()
    }

    /// Binds `key` to a value or a constructor.
    ///
    /// Registration is insert-only: binding a key that already exists fails
    /// with [`Error::DuplicateKey`] and leaves the existing binding (and the
    /// table) untouched.
    pub fn register(&self, key: &str, payload: Payload<T>) -> Result<(), Error> {
        let hash = fnv1a_32(key);
        let entry = match payload {
            Payload::Value(value) => Entry::new(key, hash, None, Some(Rc::new(value)))?,
            Payload::Constructor(constructor) => Entry::new(key, hash, Some(constructor), None)?,
        };
        self.table.borrow_mut().insert(entry)?;
        log::trace!("registered key '{key}'");
        Ok(())
    }

    /// Resolves `key` to its instance, constructing it on first use.
    ///
    /// A constructor-bound entry runs its constructor at most once; every
    /// later `get` returns the same shared instance (until a
    /// [`spawn`](Self::spawn) replaces it). Fails with [`Error::NotFound`]
    /// for unregistered keys.
    pub fn get(&self, key: &str) -> Result<Rc<T>, Error> {
        let hash = fnv1a_32(key);
        let constructor = {
            let table = self.table.borrow();
            let entry = match table.lookup(hash, key) {
                Some(entry) => entry,
                None => return Err(Error::NotFound(key.to_owned())),
            };
            match (entry.instance(), entry.constructor()) {
                (Some(instance), _) => return Ok(Rc::clone(instance)),
                (None, Some(constructor)) => Rc::clone(constructor),
                (None, None) => return Err(Error::NoConstructor(key.to_owned())),
            }
        };

        // The table borrow is released before the constructor runs so it
        // can call back into the registry.
        let instance = Rc::new(constructor(self));
        log::debug!("constructed instance for key '{key}'");

        // A reentrant `register` may have grown the table and moved slots,
        // so probe again instead of holding on to the entry. Keys are never
        // removed, so the entry is still present.
        if let Some(entry) = self.table.borrow_mut().lookup_mut(hash, key) {
            entry.set_instance(Rc::clone(&instance));
        }
        Ok(instance)
    }

    /// Forces construction of a fresh instance for `key` and caches it.
    ///
    /// The constructor runs unconditionally; the previous cached instance
    /// (if any) is replaced, and later [`get`](Self::get) calls observe the
    /// new one. Fails with [`Error::NotFound`] for unregistered keys and
    /// with [`Error::NoConstructor`] for keys bound to a direct value.
    pub fn spawn(&self, key: &str) -> Result<Rc<T>, Error> {
        let hash = fnv1a_32(key);
        let constructor = {
            let table = self.table.borrow();
            let entry = match table.lookup(hash, key) {
                Some(entry) => entry,
                None => return Err(Error::NotFound(key.to_owned())),
            };
            match entry.constructor() {
                Some(constructor) => Rc::clone(constructor),
                None => return Err(Error::NoConstructor(key.to_owned())),
            }
        };

        let instance = Rc::new(constructor(self));
        log::debug!("spawned fresh instance for key '{key}'");

        if let Some(entry) = self.table.borrow_mut().lookup_mut(hash, key) {
            entry.set_instance(Rc::clone(&instance));
        }
        Ok(instance)
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
