//! Host-debugger command entry points.
//!
//! These are the hooks the host debugger's expression evaluator calls,
//! passing the raw register quad it captured at the stop. Each prints its
//! output to stdout; the break commands additionally write a command file
//! of directives and hand back a `source <path>` instruction for the host
//! debugger to execute. The file's last directive removes the file itself,
//! so each sourcing is one-shot.

use std::fs::File;
use std::io::Write;

use crate::error::GlintResult;
use crate::types::RegisterSnapshot;

use super::Session;

impl Session
{
    /// `backtrace` hook.
    pub fn run_backtrace(&mut self, ip: u64, sp: u64, bp: u64, bx: u64)
    {
        print!("{}", self.backtrace(RegisterSnapshot::new(ip, sp, bp, bx)));
    }

    /// `listing` hook.
    pub fn run_listing(&mut self, ip: u64, sp: u64, bp: u64, bx: u64)
    {
        print!("{}", self.listing(RegisterSnapshot::new(ip, sp, bp, bx)));
    }

    /// `frame [index]` hook.
    pub fn run_frame(&mut self, ip: u64, sp: u64, bp: u64, bx: u64, update: &str)
    {
        print!("{}", self.frame(RegisterSnapshot::new(ip, sp, bp, bx), update));
    }

    /// `vars [name]` hook.
    pub fn run_vars(&mut self, ip: u64, sp: u64, bp: u64, bx: u64, name: &str)
    {
        print!("{}", self.vars(RegisterSnapshot::new(ip, sp, bp, bx), name));
    }

    /// `variable-address <name>` hook.
    pub fn run_variable_address(&mut self, ip: u64, sp: u64, bp: u64, bx: u64, name: &str)
    {
        print!("{}", self.variable_address(RegisterSnapshot::new(ip, sp, bp, bx), name));
    }

    /// `set-break [spec]` hook; returns the `source` instruction for the
    /// host debugger.
    pub fn run_set_break(&mut self, ip: u64, sp: u64, bp: u64, bx: u64, spec: &str) -> GlintResult<String>
    {
        let regs = RegisterSnapshot::new(ip, sp, bp, bx);
        self.with_command_file(|session, sink| session.set_break(regs, spec, sink))
    }

    /// `delete-break #<id>` hook; returns the `source` instruction for the
    /// host debugger.
    pub fn run_delete_break(&mut self, ip: u64, sp: u64, bp: u64, bx: u64, spec: &str) -> GlintResult<String>
    {
        let regs = RegisterSnapshot::new(ip, sp, bp, bx);
        self.with_command_file(|session, sink| session.delete_break(regs, spec, sink))
    }

    /// Run `op` with the command file as its directive sink, append the
    /// self-delete directive, and return the `source` instruction.
    fn with_command_file<F>(&mut self, op: F) -> GlintResult<String>
    where
        F: FnOnce(&mut Self, &mut dyn Write) -> String,
    {
        let path = self.config().command_file.clone();
        let mut file = File::create(&path)?;
        let output = op(self, &mut file);
        print!("{output}");
        writeln!(file, "\nshell rm -f {}", path.display())?;
        Ok(format!("source {}", path.display()))
    }
}
