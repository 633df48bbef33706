//! Serialized debug-table layout.
//!
//! Little-endian, field order exactly as the data model: anchor address,
//! line count, per-line frame spans, frame list, per-line var spans, var
//! list, string pool. String entries are NUL-terminated; the sentinel −1
//! marks every "absent" integer reference (a frame with no call offset, a
//! variable with no literal value).
//!
//! The emitter trusts its own arrays; the decoder does not. Every span and
//! string id is validated so a truncated or hostile blob fails with
//! `MalformedTable` instead of producing out-of-range indices.

use std::io::Write;

use crate::error::{GlintError, GlintResult};
use crate::table::{FunctionTable, SourceFrame, Span, StrId, StringPool, VarEntry, VarValue, ResolverId};
use crate::types::Address;

const SENTINEL: i32 = -1;

/// Encode a table into `sink` in the embedded static-data layout.
pub fn encode(table: &FunctionTable, sink: &mut dyn Write) -> GlintResult<()>
{
    sink.write_all(&table.anchor.value().to_le_bytes())?;
    write_u32(sink, table.line_frames.len() as u32)?;
    for span in &table.line_frames {
        write_span(sink, span)?;
    }

    write_u32(sink, table.frame_list.len() as u32)?;
    for frame in &table.frame_list {
        write_u32(sink, frame.file.0)?;
        write_u32(sink, frame.line)?;
        write_u32(sink, frame.function.0)?;
        write_i32(sink, frame.call_offset.map(|off| off as i32).unwrap_or(SENTINEL))?;
    }

    write_u32(sink, table.var_lines.len() as u32)?;
    for span in &table.var_lines {
        write_span(sink, span)?;
    }

    write_u32(sink, table.var_list.len() as u32)?;
    for entry in &table.var_list {
        write_u32(sink, entry.name.0)?;
        match entry.value {
            VarValue::Literal(value) => {
                write_i32(sink, value.0 as i32)?;
                sink.write_all(&0u64.to_le_bytes())?;
            }
            VarValue::Resolver(slot) => {
                write_i32(sink, SENTINEL)?;
                sink.write_all(&u64::from(slot.0).to_le_bytes())?;
            }
        }
    }

    write_u32(sink, table.strings.len() as u32)?;
    for entry in table.strings.entries() {
        sink.write_all(entry.as_bytes())?;
        sink.write_all(&[0])?;
    }

    Ok(())
}

/// Decode and validate a table from an embedded blob.
pub fn decode(bytes: &[u8]) -> GlintResult<FunctionTable>
{
    let mut reader = WireReader { bytes, at: 0 };

    let anchor = Address::from(reader.read_u64()?);
    let line_count = reader.read_u32()? as usize;
    let mut line_frames = Vec::with_capacity(line_count);
    for _ in 0..line_count {
        line_frames.push(reader.read_span()?);
    }

    let frame_count = reader.read_u32()? as usize;
    let mut frame_list = Vec::with_capacity(frame_count);
    for _ in 0..frame_count {
        let file = StrId(reader.read_u32()?);
        let line = reader.read_u32()?;
        let function = StrId(reader.read_u32()?);
        let call_offset = match reader.read_i32()? {
            SENTINEL => None,
            off if off >= 0 => Some(off as u32),
            off => return Err(GlintError::MalformedTable(format!("negative call offset {off}"))),
        };
        frame_list.push(SourceFrame {
            file,
            line,
            function,
            call_offset,
        });
    }

    let var_line_count = reader.read_u32()? as usize;
    if var_line_count != line_count {
        return Err(GlintError::MalformedTable(format!(
            "var table covers {var_line_count} lines, frame table covers {line_count}"
        )));
    }
    let mut var_lines = Vec::with_capacity(var_line_count);
    for _ in 0..var_line_count {
        var_lines.push(reader.read_span()?);
    }

    let var_count = reader.read_u32()? as usize;
    let mut var_list = Vec::with_capacity(var_count);
    for _ in 0..var_count {
        let name = StrId(reader.read_u32()?);
        let value_id = reader.read_i32()?;
        let slot = reader.read_u64()?;
        let value = if value_id == SENTINEL {
            let slot = u32::try_from(slot)
                .map_err(|_| GlintError::MalformedTable(format!("resolver slot {slot} out of range")))?;
            VarValue::Resolver(ResolverId(slot))
        } else if value_id >= 0 {
            VarValue::Literal(StrId(value_id as u32))
        } else {
            return Err(GlintError::MalformedTable(format!("negative value id {value_id}")));
        };
        var_list.push(VarEntry { name, value });
    }

    let string_count = reader.read_u32()? as usize;
    let mut entries = Vec::with_capacity(string_count);
    for _ in 0..string_count {
        entries.push(reader.read_cstr()?);
    }
    let strings = StringPool::from_entries(entries);

    let table = FunctionTable {
        anchor,
        line_frames,
        frame_list,
        var_lines,
        var_list,
        strings,
    };
    validate(&table)?;
    Ok(table)
}

/// Structural validation shared by the decoder and tests.
pub fn validate(table: &FunctionTable) -> GlintResult<()>
{
    for (line, span) in table.line_frames.iter().enumerate() {
        check_span(span, table.frame_list.len(), "frame list", line)?;
    }
    for (line, span) in table.var_lines.iter().enumerate() {
        check_span(span, table.var_list.len(), "var list", line)?;
    }
    for frame in &table.frame_list {
        check_str(&table.strings, frame.file)?;
        check_str(&table.strings, frame.function)?;
    }
    for entry in &table.var_list {
        check_str(&table.strings, entry.name)?;
        if let VarValue::Literal(value) = entry.value {
            check_str(&table.strings, value)?;
        }
    }
    Ok(())
}

fn check_span(span: &Span, list_len: usize, what: &str, line: usize) -> GlintResult<()>
{
    let end = (span.offset as usize).checked_add(span.len as usize);
    match end {
        Some(end) if end <= list_len => Ok(()),
        _ => Err(GlintError::MalformedTable(format!(
            "line {line} span ({}, {}) exceeds {what} of {list_len}",
            span.offset, span.len
        ))),
    }
}

fn check_str(pool: &StringPool, id: StrId) -> GlintResult<()>
{
    if pool.contains(id) {
        Ok(())
    } else {
        Err(GlintError::MalformedTable(format!(
            "string id {} exceeds pool of {}",
            id.0,
            pool.len()
        )))
    }
}

fn write_u32(sink: &mut dyn Write, value: u32) -> GlintResult<()>
{
    sink.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_i32(sink: &mut dyn Write, value: i32) -> GlintResult<()>
{
    sink.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_span(sink: &mut dyn Write, span: &Span) -> GlintResult<()>
{
    write_u32(sink, span.offset)?;
    write_u32(sink, span.len)
}

struct WireReader<'a>
{
    bytes: &'a [u8],
    at: usize,
}

impl WireReader<'_>
{
    fn take(&mut self, n: usize) -> GlintResult<&[u8]>
    {
        let end = self
            .at
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| GlintError::MalformedTable(format!("truncated at byte {}", self.at)))?;
        let slice = &self.bytes[self.at..end];
        self.at = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> GlintResult<u32>
    {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("fixed slice")))
    }

    fn read_i32(&mut self) -> GlintResult<i32>
    {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes(bytes.try_into().expect("fixed slice")))
    }

    fn read_u64(&mut self) -> GlintResult<u64>
    {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("fixed slice")))
    }

    fn read_span(&mut self) -> GlintResult<Span>
    {
        Ok(Span {
            offset: self.read_u32()?,
            len: self.read_u32()?,
        })
    }

    fn read_cstr(&mut self) -> GlintResult<String>
    {
        let rest = &self.bytes[self.at..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| GlintError::MalformedTable("unterminated string entry".into()))?;
        let text = std::str::from_utf8(&rest[..nul])
            .map_err(|err| GlintError::MalformedTable(format!("invalid UTF-8 in string pool: {err}")))?
            .to_string();
        self.at += nul + 1;
        Ok(text)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn sample_table() -> FunctionTable
    {
        FunctionTable {
            anchor: Address::from(0xdead_0000),
            line_frames: vec![Span { offset: 0, len: 1 }, Span { offset: 1, len: 1 }],
            frame_list: vec![
                SourceFrame {
                    file: StrId(0),
                    line: 1,
                    function: StrId(1),
                    call_offset: None,
                },
                SourceFrame {
                    file: StrId(0),
                    line: 2,
                    function: StrId(1),
                    call_offset: Some(7),
                },
            ],
            var_lines: vec![Span { offset: 0, len: 2 }, Span { offset: 2, len: 0 }],
            var_list: vec![
                VarEntry {
                    name: StrId(2),
                    value: VarValue::Literal(StrId(3)),
                },
                VarEntry {
                    name: StrId(4),
                    value: VarValue::Resolver(ResolverId(0)),
                },
            ],
            strings: StringPool::from_entries(vec![
                "loop.c".into(),
                "kernel".into(),
                "i".into(),
                "0".into(),
                "acc".into(),
            ]),
        }
    }

    #[test]
    fn test_encode_decode_round_trip()
    {
        let table = sample_table();
        let mut blob = Vec::new();
        encode(&table, &mut blob).unwrap();
        let decoded = decode(&blob).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn test_truncated_blob_rejected()
    {
        let table = sample_table();
        let mut blob = Vec::new();
        encode(&table, &mut blob).unwrap();
        let err = decode(&blob[..blob.len() / 2]).unwrap_err();
        assert!(matches!(err, GlintError::MalformedTable(_)));
    }

    #[test]
    fn test_span_out_of_range_rejected()
    {
        let mut table = sample_table();
        table.line_frames[1] = Span { offset: 1, len: 5 };
        let err = validate(&table).unwrap_err();
        assert!(matches!(err, GlintError::MalformedTable(_)));
    }

    #[test]
    fn test_string_id_out_of_range_rejected()
    {
        let mut table = sample_table();
        table.var_list[0].name = StrId(40);
        let err = validate(&table).unwrap_err();
        assert!(matches!(err, GlintError::MalformedTable(_)));
    }
}
