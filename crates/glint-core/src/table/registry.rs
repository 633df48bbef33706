//! Process-wide debug-table registry.
//!
//! Each compiled module appends its tables here once at load time; nothing
//! is ever unregistered, so entries live for the process lifetime. The
//! registry also owns the resolve-once source identity for every table:
//! instead of mutable scratch fields inside the otherwise-immutable record,
//! each entry carries a `OnceCell` that is populated on first successful
//! resolution and never invalidated.

use std::sync::{Arc, RwLock};

use once_cell::sync::{Lazy, OnceCell};

use crate::error::GlintResult;
use crate::resolver::ResolverHandle;
use crate::table::FunctionTable;

/// A table plus the resolver slots its `VarValue::Resolver` entries index.
///
/// The wire format stores only slot numbers; the handles themselves are
/// code, supplied by the generated module when it registers the table.
#[derive(Debug, Clone)]
pub struct TableRegistration
{
    /// The immutable debug table.
    pub table: FunctionTable,
    /// Resolver slots, one per distinct resolver the table uses.
    pub resolvers: Vec<ResolverHandle>,
}

impl TableRegistration
{
    /// Fetch the resolver in a slot, if the slot is valid.
    pub fn resolver(&self, slot: u32) -> Option<&ResolverHandle>
    {
        self.resolvers.get(slot as usize)
    }
}

/// The (file, start line) a table's anchor resolved to in module debug info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdentity
{
    /// Source file the generated section lives in.
    pub file: String,
    /// Line of the anchor symbol; line offsets are relative to it.
    pub start_line: u32,
}

/// Registry entry: an immutable registration and its resolve-once identity.
#[derive(Debug)]
pub struct RegisteredTable
{
    registration: TableRegistration,
    identity: OnceCell<TableIdentity>,
}

impl RegisteredTable
{
    fn new(registration: TableRegistration) -> Self
    {
        Self {
            registration,
            identity: OnceCell::new(),
        }
    }

    /// The registered table and resolver slots.
    pub fn registration(&self) -> &TableRegistration
    {
        &self.registration
    }

    /// Shorthand for the table itself.
    pub fn table(&self) -> &FunctionTable
    {
        &self.registration.table
    }

    /// The resolved identity, if resolution has succeeded before.
    pub fn identity(&self) -> Option<&TableIdentity>
    {
        self.identity.get()
    }

    /// Resolve-once: run `resolve` only if no identity is stored yet.
    ///
    /// A failed resolution stores nothing, so a later call retries; a
    /// successful one wins for the life of the process. Concurrent callers
    /// racing here are harmless because identical inputs yield identical
    /// outputs.
    pub fn identity_or_resolve<F>(&self, resolve: F) -> Option<&TableIdentity>
    where
        F: FnOnce() -> GlintResult<TableIdentity>,
    {
        self.identity.get_or_try_init(resolve).ok()
    }
}

/// Append-only list of registered tables.
#[derive(Debug, Default)]
pub struct Registry
{
    entries: RwLock<Vec<Arc<RegisteredTable>>>,
}

impl Registry
{
    /// Create an empty registry (tests and embedders; production code uses
    /// [`Registry::global`]).
    pub fn new() -> Self
    {
        Self::default()
    }

    /// The process-wide registry generated modules register into.
    pub fn global() -> Arc<Registry>
    {
        static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));
        GLOBAL.clone()
    }

    /// Append a registration; the registration ABI each compiled module
    /// invokes once per table at load time.
    pub fn register(&self, registration: TableRegistration) -> Arc<RegisteredTable>
    {
        let entry = Arc::new(RegisteredTable::new(registration));
        self.entries
            .write()
            .expect("table registry lock poisoned")
            .push(entry.clone());
        tracing::debug!("registered debug table at anchor {}", entry.table().anchor);
        entry
    }

    /// Snapshot of all entries in registration order.
    pub fn snapshot(&self) -> Vec<Arc<RegisteredTable>>
    {
        self.entries.read().expect("table registry lock poisoned").clone()
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize
    {
        self.entries.read().expect("table registry lock poisoned").len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }
}
