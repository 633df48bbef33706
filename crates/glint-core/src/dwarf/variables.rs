//! DIE-tree search and location-expression evaluation for live variables.
//!
//! Mirrors the lookup the host debugger would do itself: find the
//! subprogram covering the stopped PC, search its variable and parameter
//! DIEs (and nested lexical blocks) for the requested name, then evaluate
//! the location description against the frame base.
//!
//! Two limitations are deliberate and load-bearing for compatibility with
//! the code generator's output:
//! - lexical blocks are searched without filtering on their own PC ranges,
//!   an over-approximation that can surface a variable from a sibling block;
//! - only entry 0 of a multi-entry location list is decoded, so PC-sensitive
//!   location lists are not handled.

use gimli::{constants, AttributeValue, EntriesTreeNode, Expression, Operation, Reader, Unit, UnitOffset, UnitSectionOffset};
use smallvec::SmallVec;

use super::{OwnedDwarf, OwnedReader};
use crate::error::{GlintError, GlintResult};
use crate::types::Address;
use crate::unwind::MemoryAccess;

const MAX_NAME_INDIRECTION: usize = 16;

/// Find the runtime address of `name` in the subprogram covering
/// `relative_pc`, with `frame_base` as the origin for frame-relative
/// locations.
pub(super) fn find_var_address(
    dwarf: &OwnedDwarf,
    relative_pc: Address,
    name: &str,
    frame_base: Address,
    memory: &dyn MemoryAccess,
) -> GlintResult<Address>
{
    let pc = relative_pc.value();
    let mut headers = dwarf.units();
    while let Some(header) = headers.next().map_err(|err| walk_failed(name, err))? {
        let unit = dwarf.unit(header).map_err(|err| walk_failed(name, err))?;
        if !unit_contains(dwarf, &unit, pc).map_err(|err| walk_failed(name, err))? {
            continue;
        }

        let mut tree = unit
            .entries_tree(None)
            .map_err(|err| walk_failed(name, err))?;
        let root = tree.root().map_err(|err| walk_failed(name, err))?;
        if let Some(address) = search_node(dwarf, &unit, root, pc, name, frame_base, memory)? {
            return Ok(address);
        }
    }
    Err(GlintError::VariableNotFound(name.to_string()))
}

fn unit_contains(dwarf: &OwnedDwarf, unit: &Unit<OwnedReader>, pc: u64) -> Result<bool, gimli::Error>
{
    let mut ranges = dwarf.unit_ranges(unit)?;
    while let Some(range) = ranges.next()? {
        if pc >= range.begin && pc < range.end {
            return Ok(true);
        }
    }
    Ok(false)
}

/// DFS for the subprogram whose PC range contains the stop address;
/// everything that is not a subprogram is just descended through.
fn search_node(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    node: EntriesTreeNode<'_, '_, '_, OwnedReader>,
    pc: u64,
    name: &str,
    frame_base: Address,
    memory: &dyn MemoryAccess,
) -> GlintResult<Option<Address>>
{
    let entry = node.entry();
    if entry.tag() == constants::DW_TAG_subprogram {
        let offset = entry.offset();
        if die_contains(dwarf, unit, offset, pc).map_err(|err| walk_failed(name, err))? {
            return search_scope(dwarf, unit, offset, name, frame_base, memory);
        }
        return Ok(None);
    }

    let mut children = node.children();
    while let Some(child) = children.next().map_err(|err| walk_failed(name, err))? {
        if let Some(address) = search_node(dwarf, unit, child, pc, name, frame_base, memory)? {
            return Ok(Some(address));
        }
    }
    Ok(None)
}

fn die_contains(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    offset: UnitOffset<usize>,
    pc: u64,
) -> Result<bool, gimli::Error>
{
    let entry = unit.entry(offset)?;
    let mut ranges = dwarf.die_ranges(unit, &entry)?;
    while let Some(range) = ranges.next()? {
        if pc >= range.begin && pc < range.end {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Search a subprogram (or lexical block) scope: direct variable/parameter
/// children first, then nested lexical blocks in document order.
fn search_scope(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    offset: UnitOffset<usize>,
    name: &str,
    frame_base: Address,
    memory: &dyn MemoryAccess,
) -> GlintResult<Option<Address>>
{
    let mut tree = unit
        .entries_tree(Some(offset))
        .map_err(|err| walk_failed(name, err))?;
    let root = tree.root().map_err(|err| walk_failed(name, err))?;
    let mut children = root.children();

    let mut blocks = Vec::new();
    while let Some(child) = children.next().map_err(|err| walk_failed(name, err))? {
        let entry = child.entry();
        match entry.tag() {
            constants::DW_TAG_variable | constants::DW_TAG_formal_parameter => {
                let die_name =
                    resolve_die_name(dwarf, unit, entry.offset(), 0).map_err(|err| walk_failed(name, err))?;
                if die_name.as_deref() == Some(name) {
                    return decode_location(dwarf, unit, entry.offset(), name, frame_base, memory).map(Some);
                }
            }
            // Intentionally no PC-range check on the block itself.
            constants::DW_TAG_lexical_block => blocks.push(entry.offset()),
            _ => {}
        }
    }

    for block in blocks {
        if let Some(address) = search_scope(dwarf, unit, block, name, frame_base, memory)? {
            return Ok(Some(address));
        }
    }
    Ok(None)
}

/// Resolve a DIE's name, following `DW_AT_specification` and
/// `DW_AT_abstract_origin` when the name is not present directly.
fn resolve_die_name(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    offset: UnitOffset<usize>,
    depth: usize,
) -> Result<Option<String>, gimli::Error>
{
    if depth >= MAX_NAME_INDIRECTION {
        return Ok(None);
    }

    let entry = unit.entry(offset)?;
    if let Some(value) = entry.attr_value(constants::DW_AT_name)? {
        let text = dwarf.attr_string(unit, value)?;
        return Ok(Some(text.to_string_lossy()?.into_owned()));
    }

    for indirection in [constants::DW_AT_specification, constants::DW_AT_abstract_origin] {
        let Some(value) = entry.attr_value(indirection)? else {
            continue;
        };
        let target = match value {
            AttributeValue::UnitRef(target) => Some(target),
            AttributeValue::DebugInfoRef(target) => UnitSectionOffset::from(target).to_unit_offset(unit),
            _ => None,
        };
        if let Some(target) = target {
            if let Some(found) = resolve_die_name(dwarf, unit, target, depth + 1)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

/// Decode a variable DIE's location into a runtime address.
///
/// Exactly two shapes are accepted: `[fbreg offset]` giving
/// `frame_base + offset`, and `[fbreg offset, deref]` giving the 8-byte
/// value stored there. Everything else is `InvalidLocationExpression`.
fn decode_location(
    dwarf: &OwnedDwarf,
    unit: &Unit<OwnedReader>,
    offset: UnitOffset<usize>,
    name: &str,
    frame_base: Address,
    memory: &dyn MemoryAccess,
) -> GlintResult<Address>
{
    let entry = unit.entry(offset).map_err(|err| walk_failed(name, err))?;
    let value = entry
        .attr_value(constants::DW_AT_location)
        .map_err(|err| walk_failed(name, err))?
        .ok_or_else(|| GlintError::VariableNotFound(name.to_string()))?;

    let expression = match value {
        AttributeValue::Exprloc(expression) => expression,
        other => {
            let mut entries = dwarf
                .attr_locations(unit, other)
                .map_err(|err| walk_failed(name, err))?
                .ok_or_else(|| GlintError::VariableNotFound(name.to_string()))?;
            // Only entry 0; PC-sensitive location lists are out of scope.
            let first = entries
                .next()
                .map_err(|err| walk_failed(name, err))?
                .ok_or_else(|| GlintError::VariableNotFound(name.to_string()))?;
            first.data
        }
    };

    decode_expression(unit, expression, name, frame_base, memory)
}

fn decode_expression(
    unit: &Unit<OwnedReader>,
    expression: Expression<OwnedReader>,
    name: &str,
    frame_base: Address,
    memory: &dyn MemoryAccess,
) -> GlintResult<Address>
{
    let invalid = || GlintError::InvalidLocationExpression(name.to_string());

    let mut ops: SmallVec<[Operation<OwnedReader>; 2]> = SmallVec::new();
    let mut iter = expression.operations(unit.encoding());
    while let Some(op) = iter.next().map_err(|_| invalid())? {
        if ops.len() == 2 {
            return Err(invalid());
        }
        ops.push(op);
    }

    match ops.as_slice() {
        [Operation::FrameOffset { offset }] => Ok(frame_base.signed_offset(*offset)),
        [Operation::FrameOffset { offset }, Operation::Deref { .. }] => {
            let slot = frame_base.signed_offset(*offset);
            let value = memory.read_u64(slot)?;
            Ok(Address::from(value))
        }
        _ => Err(invalid()),
    }
}

fn walk_failed(name: &str, err: gimli::Error) -> GlintError
{
    tracing::debug!("DWARF walk failed while looking up {name}: {err}");
    GlintError::VariableNotFound(name.to_string())
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use gimli::{Encoding, Format};

    use super::*;
    use crate::error::GlintResult;

    struct FakeMemory(HashMap<u64, u64>);

    impl MemoryAccess for FakeMemory
    {
        fn read_u64(&self, address: Address) -> GlintResult<u64>
        {
            self.0.get(&address.value()).copied().ok_or_else(|| {
                GlintError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "unmapped"))
            })
        }
    }

    fn encoding() -> Encoding
    {
        Encoding {
            address_size: 8,
            format: Format::Dwarf32,
            version: 4,
        }
    }

    /// Evaluate raw expression bytes the way `decode_expression` does,
    /// without needing a full unit.
    fn eval(bytes: &'static [u8], frame_base: u64, memory: &dyn MemoryAccess) -> GlintResult<Address>
    {
        let reader = OwnedReader::new(std::sync::Arc::from(bytes), gimli::RunTimeEndian::Little);
        let expression = Expression(reader);

        let invalid = || GlintError::InvalidLocationExpression("x".to_string());
        let mut ops: SmallVec<[Operation<OwnedReader>; 2]> = SmallVec::new();
        let mut iter = expression.operations(encoding());
        while let Some(op) = iter.next().map_err(|_| invalid())? {
            if ops.len() == 2 {
                return Err(invalid());
            }
            ops.push(op);
        }

        let frame_base = Address::from(frame_base);
        match ops.as_slice() {
            [Operation::FrameOffset { offset }] => Ok(frame_base.signed_offset(*offset)),
            [Operation::FrameOffset { offset }, Operation::Deref { .. }] => {
                let slot = frame_base.signed_offset(*offset);
                Ok(Address::from(memory.read_u64(slot)?))
            }
            _ => Err(invalid()),
        }
    }

    // DW_OP_fbreg = 0x91 (SLEB128 operand), DW_OP_deref = 0x06,
    // DW_OP_addr = 0x03.

    #[test]
    fn test_fbreg_offset()
    {
        let memory = FakeMemory(HashMap::new());
        let addr = eval(&[0x91, 0x10], 0x7000, &memory).unwrap();
        assert_eq!(addr, Address::from(0x7010));
    }

    #[test]
    fn test_fbreg_negative_offset()
    {
        let memory = FakeMemory(HashMap::new());
        // SLEB128 -24
        let addr = eval(&[0x91, 0x68], 0x7000, &memory).unwrap();
        assert_eq!(addr, Address::from(0x7000 - 24));
    }

    #[test]
    fn test_fbreg_then_deref()
    {
        let mut cells = HashMap::new();
        cells.insert(0x7010, 0xcafe_f00d);
        let memory = FakeMemory(cells);
        let addr = eval(&[0x91, 0x10, 0x06], 0x7000, &memory).unwrap();
        assert_eq!(addr, Address::from(0xcafe_f00d));
    }

    #[test]
    fn test_other_shapes_rejected()
    {
        let memory = FakeMemory(HashMap::new());
        // A lone DW_OP_addr is not frame-relative.
        let err = eval(&[0x03, 0, 0, 0, 0, 0, 0, 0, 0], 0x7000, &memory).unwrap_err();
        assert!(matches!(err, GlintError::InvalidLocationExpression(_)));

        // Three operations never decode.
        let err = eval(&[0x91, 0x10, 0x06, 0x06], 0x7000, &memory).unwrap_err();
        assert!(matches!(err, GlintError::InvalidLocationExpression(_)));
    }
}
