//! # Context Builder
//!
//! Build-time accumulator that records, while a code generator emits target
//! lines, which original-source locations and variable bindings each line
//! corresponds to, then freezes the result into a serialized
//! [`FunctionTable`](crate::table::FunctionTable).
//!
//! One builder serves many sections: `begin_section` opens a fresh section
//! (resetting all per-section state), `end_section` freezes it, and
//! `emit_function_info` serializes and is terminal. Any mutator called
//! without an open section fails with `InvalidState`.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use crate::error::{GlintError, GlintResult};
use crate::resolver::ResolverHandle;
use crate::table::registry::TableRegistration;
use crate::table::{wire, FunctionTable, ResolverId, SourceFrame, Span, StrId, StringPool, VarEntry, VarValue};
use crate::types::Address;

/// One synthetic frame as the generator sees it, before string interning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation
{
    /// Original source file path.
    pub file: String,
    /// Original source line.
    pub line: u32,
    /// Enclosing function name in the original source.
    pub function: String,
    /// Offset annotation within the enclosing function; `None` for the
    /// innermost frame.
    pub call_offset: Option<u32>,
}

/// A variable's build-time binding: a literal display string, or a resolver
/// that will compute the value at debug time.
#[derive(Debug, Clone)]
pub enum VarBinding
{
    /// Display value captured literally while generating.
    Literal(String),
    /// Deferred to a runtime resolver.
    Resolver(ResolverHandle),
}

#[derive(Debug, Default)]
struct LineRecord
{
    frames: Vec<SourceLocation>,
    vars: BTreeMap<String, VarBinding>,
}

#[derive(Debug)]
struct SectionState
{
    anchor_name: String,
    lines: Vec<LineRecord>,
    scopes: Vec<BTreeMap<String, VarBinding>>,
}

#[derive(Debug, Default)]
enum Phase
{
    #[default]
    Idle,
    Open(SectionState),
    Frozen(SectionState),
}

/// Accumulates per-line source stacks and live-variable state during code
/// generation and serializes them into debug tables.
#[derive(Debug, Default)]
pub struct SectionBuilder
{
    phase: Phase,
    anchor_counter: u32,
}

impl SectionBuilder
{
    /// Create a builder with no open section.
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Open a new section, discarding any previous per-section state.
    ///
    /// Returns the unique anchor symbol name the generator must emit at the
    /// section's start; its address becomes the table's matching key. The
    /// section starts positioned at generated line 0 with one open scope.
    pub fn begin_section(&mut self) -> String
    {
        let anchor_name = format!("glint_section_anchor_{}", self.anchor_counter);
        self.anchor_counter += 1;

        let mut state = SectionState {
            anchor_name: anchor_name.clone(),
            lines: Vec::new(),
            scopes: vec![BTreeMap::new()],
        };
        open_line(&mut state);
        self.phase = Phase::Open(state);
        anchor_name
    }

    /// Freeze the open section; only `emit_function_info` may follow.
    pub fn end_section(&mut self) -> GlintResult<()>
    {
        match std::mem::take(&mut self.phase) {
            Phase::Open(state) => {
                self.phase = Phase::Frozen(state);
                Ok(())
            }
            other => {
                self.phase = other;
                Err(GlintError::InvalidState("end_section requires an open section"))
            }
        }
    }

    /// Advance to the next generated line, snapshotting currently-live
    /// variables into the new line.
    pub fn nextl(&mut self) -> GlintResult<()>
    {
        let state = self.open_state("nextl")?;
        open_line(state);
        Ok(())
    }

    /// Append one synthetic frame to the current line's stack.
    ///
    /// Append order defines the frame index; index 0 is treated by every
    /// consumer as the innermost original-source location.
    pub fn push_source_loc(&mut self, loc: SourceLocation) -> GlintResult<()>
    {
        let state = self.open_state("push_source_loc")?;
        current_line(state).frames.push(loc);
        Ok(())
    }

    /// Open a nested variable scope.
    pub fn push_var_scope(&mut self) -> GlintResult<()>
    {
        let state = self.open_state("push_var_scope")?;
        state.scopes.push(BTreeMap::new());
        Ok(())
    }

    /// Close the innermost variable scope.
    pub fn pop_var_scope(&mut self) -> GlintResult<()>
    {
        let state = self.open_state("pop_var_scope")?;
        if state.scopes.len() <= 1 {
            return Err(GlintError::InvalidState("pop_var_scope would close the root scope"));
        }
        state.scopes.pop();
        Ok(())
    }

    /// Declare a variable in the innermost scope with an empty value.
    pub fn create_var(&mut self, name: &str) -> GlintResult<()>
    {
        let state = self.open_state("create_var")?;
        innermost(state).insert(name.to_string(), VarBinding::Literal(String::new()));
        Ok(())
    }

    /// Remove a variable from the innermost scope.
    pub fn delete_var(&mut self, name: &str) -> GlintResult<()>
    {
        let state = self.open_state("delete_var")?;
        innermost(state).remove(name);
        Ok(())
    }

    /// Overwrite the binding in the nearest enclosing scope that already
    /// defines `name`. A no-op when no open scope defines it.
    pub fn update_var(&mut self, name: &str, binding: VarBinding) -> GlintResult<()>
    {
        let state = self.open_state("update_var")?;
        for scope in state.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = binding;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Write a binding directly into the current line's snapshot, bypassing
    /// the scope stack.
    pub fn set_var_here(&mut self, name: &str, binding: VarBinding) -> GlintResult<()>
    {
        let state = self.open_state("set_var_here")?;
        current_line(state).vars.insert(name.to_string(), binding);
        Ok(())
    }

    /// Freeze, intern, flatten, serialize. Terminal for the section.
    ///
    /// Writes the wire-format table into `sink` and returns the registration
    /// the generated module must feed to the registry at load time.
    /// `anchor_address` is the runtime address the anchor symbol resolved to
    /// (tests and embedders pass it directly; generated code takes the
    /// symbol's address).
    pub fn emit_function_info(
        &mut self,
        anchor_address: Address,
        sink: &mut dyn Write,
    ) -> GlintResult<TableRegistration>
    {
        let state = match std::mem::take(&mut self.phase) {
            Phase::Open(state) | Phase::Frozen(state) => state,
            Phase::Idle => {
                return Err(GlintError::InvalidState("emit_function_info requires a section"));
            }
        };
        tracing::debug!(
            "emitting debug table for {} with {} lines",
            state.anchor_name,
            state.lines.len()
        );

        let mut strings = StringInterner::default();
        let mut resolvers = ResolverSlots::default();

        let mut line_frames = Vec::with_capacity(state.lines.len());
        let mut frame_list = Vec::new();
        let mut var_lines = Vec::with_capacity(state.lines.len());
        let mut var_list = Vec::new();

        for record in &state.lines {
            line_frames.push(Span {
                offset: frame_list.len() as u32,
                len: record.frames.len() as u32,
            });
            for frame in &record.frames {
                frame_list.push(SourceFrame {
                    file: strings.intern(&frame.file),
                    line: frame.line,
                    function: strings.intern(&frame.function),
                    call_offset: frame.call_offset,
                });
            }

            var_lines.push(Span {
                offset: var_list.len() as u32,
                len: record.vars.len() as u32,
            });
            for (name, binding) in &record.vars {
                let value = match binding {
                    VarBinding::Literal(text) => VarValue::Literal(strings.intern(text)),
                    VarBinding::Resolver(handle) => VarValue::Resolver(resolvers.slot_for(handle)),
                };
                var_list.push(VarEntry {
                    name: strings.intern(name),
                    value,
                });
            }
        }

        let table = FunctionTable {
            anchor: anchor_address,
            line_frames,
            frame_list,
            var_lines,
            var_list,
            strings: strings.finish(),
        };
        wire::encode(&table, sink)?;

        Ok(TableRegistration {
            table,
            resolvers: resolvers.finish(),
        })
    }

    fn open_state(&mut self, op: &'static str) -> GlintResult<&mut SectionState>
    {
        match &mut self.phase {
            Phase::Open(state) => Ok(state),
            Phase::Frozen(_) | Phase::Idle => Err(GlintError::InvalidState(op)),
        }
    }
}

/// Start a new line record and snapshot every live variable into it.
///
/// Scopes are visited innermost to outermost; the first definition found for
/// a name wins, so an outer-scope value never clobbers a shadowing inner one.
fn open_line(state: &mut SectionState)
{
    let mut record = LineRecord::default();
    for scope in state.scopes.iter().rev() {
        for (name, binding) in scope {
            if !record.vars.contains_key(name) {
                record.vars.insert(name.clone(), binding.clone());
            }
        }
    }
    state.lines.push(record);
}

fn current_line(state: &mut SectionState) -> &mut LineRecord
{
    state.lines.last_mut().expect("section always has an open line")
}

fn innermost(state: &mut SectionState) -> &mut BTreeMap<String, VarBinding>
{
    state.scopes.last_mut().expect("section always has a root scope")
}

#[derive(Default)]
struct StringInterner
{
    entries: Vec<String>,
    reverse: HashMap<String, StrId>,
}

impl StringInterner
{
    fn intern(&mut self, text: &str) -> StrId
    {
        if let Some(&id) = self.reverse.get(text) {
            return id;
        }
        let id = StrId(self.entries.len() as u32);
        self.entries.push(text.to_string());
        self.reverse.insert(text.to_string(), id);
        id
    }

    fn finish(self) -> StringPool
    {
        StringPool::from_entries(self.entries)
    }
}

/// Per-table resolver slots, deduplicated by handle identity so each
/// distinct resolver serializes exactly once.
#[derive(Default)]
struct ResolverSlots
{
    slots: Vec<ResolverHandle>,
}

impl ResolverSlots
{
    fn slot_for(&mut self, handle: &ResolverHandle) -> ResolverId
    {
        if let Some(found) = self.slots.iter().position(|slot| slot.same_as(handle)) {
            return ResolverId(found as u32);
        }
        let id = ResolverId(self.slots.len() as u32);
        self.slots.push(handle.clone());
        id
    }

    fn finish(self) -> Vec<ResolverHandle>
    {
        self.slots
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::Arc;

    use super::*;
    use crate::resolver::{FrameAccess, ValueResolver};
    use crate::table::wire;

    struct NullResolver;

    impl ValueResolver for NullResolver
    {
        fn resolve(&self, _name: &str, _frame: &FrameAccess<'_>) -> String
        {
            String::new()
        }
    }

    fn loc(file: &str, line: u32) -> SourceLocation
    {
        SourceLocation {
            file: file.into(),
            line,
            function: "main".into(),
            call_offset: None,
        }
    }

    #[test]
    fn test_anchor_names_unique()
    {
        let mut builder = SectionBuilder::new();
        let first = builder.begin_section();
        let second = builder.begin_section();
        assert_ne!(first, second);
        assert!(first.starts_with("glint_section_anchor_"));
    }

    #[test]
    fn test_mutators_fail_without_section()
    {
        let mut builder = SectionBuilder::new();
        assert!(matches!(builder.nextl(), Err(GlintError::InvalidState(_))));

        builder.begin_section();
        builder.end_section().unwrap();
        assert!(matches!(
            builder.push_source_loc(loc("a.c", 1)),
            Err(GlintError::InvalidState(_))
        ));
        assert!(matches!(
            builder.create_var("x"),
            Err(GlintError::InvalidState(_))
        ));
    }

    #[test]
    fn test_scope_shadowing_snapshot()
    {
        let mut builder = SectionBuilder::new();
        builder.begin_section();

        builder.create_var("x").unwrap();
        builder.update_var("x", VarBinding::Literal("outer".into())).unwrap();

        builder.push_var_scope().unwrap();
        builder.create_var("x").unwrap();
        builder.update_var("x", VarBinding::Literal("inner".into())).unwrap();
        builder.nextl().unwrap();

        builder.pop_var_scope().unwrap();
        builder.nextl().unwrap();

        let registration = builder
            .emit_function_info(Address::from(0x100), &mut Vec::new())
            .unwrap();
        let table = &registration.table;

        // Line 1 sees the shadowing inner binding, line 2 the outer one.
        let inner = table.vars_for_line(1);
        assert_eq!(inner.len(), 1);
        assert_eq!(table.string(inner[0].name), "x");
        match inner[0].value {
            VarValue::Literal(id) => assert_eq!(table.string(id), "inner"),
            VarValue::Resolver(_) => panic!("expected literal"),
        }

        let outer = table.vars_for_line(2);
        match outer[0].value {
            VarValue::Literal(id) => assert_eq!(table.string(id), "outer"),
            VarValue::Resolver(_) => panic!("expected literal"),
        }
    }

    #[test]
    fn test_update_var_missing_is_noop()
    {
        let mut builder = SectionBuilder::new();
        builder.begin_section();
        builder.update_var("ghost", VarBinding::Literal("1".into())).unwrap();
        builder.nextl().unwrap();

        let registration = builder
            .emit_function_info(Address::from(0x100), &mut Vec::new())
            .unwrap();
        assert!(registration.table.vars_for_line(1).is_empty());
    }

    #[test]
    fn test_set_var_here_bypasses_scopes()
    {
        let mut builder = SectionBuilder::new();
        builder.begin_section();
        builder
            .set_var_here("tmp", VarBinding::Literal("7".into()))
            .unwrap();
        builder.nextl().unwrap();

        let registration = builder
            .emit_function_info(Address::from(0x100), &mut Vec::new())
            .unwrap();
        let table = &registration.table;
        assert_eq!(table.vars_for_line(0).len(), 1);
        assert!(table.vars_for_line(1).is_empty());
    }

    #[test]
    fn test_resolver_slots_deduplicated()
    {
        let shared = ResolverHandle::new(Arc::new(NullResolver));
        let other = ResolverHandle::new(Arc::new(NullResolver));

        let mut builder = SectionBuilder::new();
        builder.begin_section();
        builder.create_var("a").unwrap();
        builder.create_var("b").unwrap();
        builder.create_var("c").unwrap();
        builder.update_var("a", VarBinding::Resolver(shared.clone())).unwrap();
        builder.update_var("b", VarBinding::Resolver(shared.clone())).unwrap();
        builder.update_var("c", VarBinding::Resolver(other)).unwrap();
        builder.nextl().unwrap();

        let registration = builder
            .emit_function_info(Address::from(0x100), &mut Vec::new())
            .unwrap();
        assert_eq!(registration.resolvers.len(), 2);
        assert!(registration.resolvers[0].same_as(&shared));
    }

    #[test]
    fn test_emit_round_trips_through_wire()
    {
        let mut builder = SectionBuilder::new();
        builder.begin_section();
        builder.push_source_loc(loc("s.c", 1)).unwrap();
        builder.nextl().unwrap();
        builder.push_source_loc(loc("s.c", 2)).unwrap();

        let mut blob = Vec::new();
        let registration = builder.emit_function_info(Address::from(0x100), &mut blob).unwrap();
        let decoded = wire::decode(&blob).unwrap();
        assert_eq!(decoded, registration.table);
        assert_eq!(decoded.line_count(), 2);
    }
}
