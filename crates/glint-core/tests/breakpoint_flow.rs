//! Breakpoint fan-out and command-file flow over in-memory backends.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use glint_core::builder::{SectionBuilder, SourceLocation};
use glint_core::table::registry::Registry;
use glint_core::types::Address;
use glint_core::{Session, SessionConfig};

use common::{regs_at, FakeInfo, FakeMemory, FakeModules, FakeOpener, FakeUnwinder, LOAD_BASE};

fn loc(file: &str, line: u32, function: &str) -> SourceLocation
{
    SourceLocation {
        file: file.to_string(),
        line,
        function: function.to_string(),
        call_offset: None,
    }
}

/// Three generated lines mapping to main:1, main:3, main:4 of `src_file`.
fn register_section(registry: &Registry, anchor: u64, src_file: &str)
{
    let mut builder = SectionBuilder::new();
    builder.begin_section();
    builder.push_source_loc(loc(src_file, 1, "main")).unwrap();
    builder.nextl().unwrap();
    builder.push_source_loc(loc(src_file, 3, "main")).unwrap();
    builder.nextl().unwrap();
    builder.push_source_loc(loc(src_file, 4, "main")).unwrap();
    builder.end_section().unwrap();
    let registration = builder
        .emit_function_info(Address::from(anchor), &mut Vec::new())
        .unwrap();
    registry.register(registration);
}

/// Two registered sections in one generated file, anchored at generated
/// lines 100 and 200.
fn two_section_session(config: SessionConfig) -> Session
{
    let registry = Arc::new(Registry::new());
    register_section(&registry, 0x5000, "/src/s.c");
    register_section(&registry, 0x6000, "/src/s.c");

    let mut lines = HashMap::new();
    lines.insert(0x4000, ("/gen/out.c".to_string(), 100));
    lines.insert(0x4010, ("/gen/out.c".to_string(), 101));
    lines.insert(0x4020, ("/gen/out.c".to_string(), 102));
    lines.insert(0x5000, ("/gen/out.c".to_string(), 200));
    let info = Arc::new(FakeInfo {
        lines,
        var_offsets: HashMap::new(),
    });

    Session::new(
        registry,
        Box::new(FakeModules {
            lo: LOAD_BASE,
            hi: LOAD_BASE + 0x10000,
        }),
        Box::new(FakeOpener(info)),
        Box::new(FakeUnwinder(0x7000)),
        Box::new(FakeMemory(HashMap::new())),
        config,
    )
}

#[test]
fn test_set_break_fans_out_across_sections()
{
    let mut session = two_section_session(SessionConfig::default());
    let regs = regs_at(LOAD_BASE + 0x4010);

    let mut sink = Vec::new();
    let message = session.set_break(regs, "s.c:3", &mut sink);
    assert_eq!(message, "Inserting 2 breakpoints with ID: #0\n");
    assert_eq!(
        String::from_utf8(sink).unwrap(),
        "break /gen/out.c:101\nbreak /gen/out.c:201\n"
    );

    let listing = session.set_break(regs, "", &mut Vec::new());
    assert_eq!(listing, "Following breakpoints exist:\n#0 [ENABLED] s.c:3\n");
}

#[test]
fn test_bare_line_spec_uses_selected_frame_file()
{
    let mut session = two_section_session(SessionConfig::default());
    let regs = regs_at(LOAD_BASE + 0x4010);

    let mut sink = Vec::new();
    let message = session.set_break(regs, "3", &mut sink);
    assert_eq!(message, "Inserting 2 breakpoints with ID: #0\n");
}

#[test]
fn test_bare_line_spec_without_context_aborts()
{
    let mut session = two_section_session(SessionConfig::default());
    // Stopped outside every module: no selected frame, no file to borrow.
    let message = session.set_break(regs_at(0x9999_0000), "3", &mut Vec::new());
    assert!(message.starts_with("Cannot identify"));
}

#[test]
fn test_malformed_spec_becomes_user_message()
{
    let mut session = two_section_session(SessionConfig::default());
    let message = session.set_break(regs_at(LOAD_BASE + 0x4010), "nonsense", &mut Vec::new());
    assert!(message.contains("[<filename>:]<linenumber>"));
}

#[test]
fn test_delete_break_clears_group_and_burns_id()
{
    let mut session = two_section_session(SessionConfig::default());
    let regs = regs_at(LOAD_BASE + 0x4010);
    session.set_break(regs, "s.c:3", &mut Vec::new());

    let mut sink = Vec::new();
    let message = session.delete_break(regs, "#0", &mut sink);
    assert_eq!(message, "Deleting 2 breakpoints for ID: #0\n");
    assert_eq!(
        String::from_utf8(sink).unwrap(),
        "clear /gen/out.c:101\nclear /gen/out.c:201\n"
    );

    let listing = session.set_break(regs, "", &mut Vec::new());
    assert_eq!(listing, "Following breakpoints exist:\n");
    let again = session.delete_break(regs, "#0", &mut Vec::new());
    assert_eq!(again, "#0 is not a valid breakpoint id\n");
}

#[test]
fn test_command_file_round_trip()
{
    let dir = tempfile::tempdir().unwrap();
    let command_file = dir.path().join(".glint.commands");
    let config = SessionConfig {
        command_file: command_file.clone(),
        ..SessionConfig::default()
    };
    let mut session = two_section_session(config);

    let regs = regs_at(LOAD_BASE + 0x4010);
    let instruction = session
        .run_set_break(regs.ip.value(), regs.sp.value(), regs.bp.value(), regs.bx.value(), "s.c:3")
        .unwrap();
    assert_eq!(instruction, format!("source {}", command_file.display()));

    let contents = std::fs::read_to_string(&command_file).unwrap();
    assert_eq!(
        contents,
        format!(
            "break /gen/out.c:101\nbreak /gen/out.c:201\n\nshell rm -f {}\n",
            command_file.display()
        )
    );
}
