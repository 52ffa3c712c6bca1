//! Two-pass statement compiler (§4.4), grounded on `compiler/compile.c` and
//! the driver in `compiler/xsys35c.c`.
//!
//! Pass 1 ("preprocess") runs the exact same recursive-descent parser as
//! pass 2 ("compile") but against a [`Buffer::null`], so every side effect
//! that only depends on *seeing* a construct — declaring a variable,
//! registering a function's name and parameter count, validating syntax —
//! happens once, before any address is known. Pass 2 re-walks the identical
//! source text against a real buffer and resolves every forward reference
//! the null pass couldn't: labels (resolved within one page, via the same
//! buffer's own hole chain) and functions (which may resolve on a page
//! compiled much later, via a chain threaded through whichever pages
//! referenced them).

use crate::ain::AinFunction;
use crate::buffer::{self, emit_var, Buffer};
use crate::command::{self, cmd2, cmd3};
use crate::config::{Config, SysVer};
use crate::debuginfo::DebugInfo;
use crate::error::{Error, Result};
use crate::expr::{self, OP_END};
use crate::lexer::{Command, Lexer};
use crate::sco;
use crate::symbol::{Function, Label, NameBinding, SymbolTable};
use std::collections::BTreeMap;

fn patch_func_ref(buf: &mut Buffer, addr: u32, page: u16, target: u32) -> (u16, u32) {
    let old_page = buf.swap_word(addr, page);
    let old_addr = buf.swap_dword(addr + 2, target);
    (old_page, old_addr)
}

fn read_func_ref(buf: &Buffer, addr: u32) -> (u16, u32) {
    let page = buf.get_byte(addr) as u16 | (buf.get_byte(addr + 1) as u16) << 8;
    let a = buf.get_byte(addr + 2) as u32
        | (buf.get_byte(addr + 3) as u32) << 8
        | (buf.get_byte(addr + 4) as u32) << 16
        | (buf.get_byte(addr + 5) as u32) << 24;
    (page, a)
}

/// Drives both compilation passes over a whole source list and assembles
/// the finished pages plus side artifacts (`.AIN`, `.dsym`), mirroring
/// `build_ald`'s two loops.
pub struct Compiler {
    pub cfg: Config,
    pub src_paths: Vec<String>,
    pub sym: SymbolTable,
    pub variables: Vec<String>,
    pub pages: Vec<Buffer>,
    pub debug: Option<DebugInfo>,
    pub messages: Vec<String>,
    page_volumes: Vec<u8>,
}

impl Compiler {
    pub fn new(cfg: Config, src_paths: Vec<String>, sources: &[(String, String)]) -> Self {
        let debug = if cfg.debug { Some(DebugInfo::new(sources)) } else { None };
        let n = src_paths.len();
        Compiler {
            cfg,
            src_paths,
            sym: SymbolTable::new(),
            variables: Vec::new(),
            pages: Vec::new(),
            debug,
            messages: Vec::new(),
            page_volumes: vec![1; n],
        }
    }

    fn lookup_or_create_var(&mut self, name: &str) -> u32 {
        if let Some(NameBinding::Variable(id)) = self.sym.names.get(name) {
            return *id;
        }
        let id = self.variables.len() as u32;
        self.variables.push(name.to_string());
        self.sym.names.insert(name.to_string(), NameBinding::Variable(id));
        id
    }

    /// Pass 1: collect variable/constant/function declarations against a
    /// null buffer. Must run over every source file, in order, before any
    /// [`compile`](Self::compile) call.
    pub fn preprocess(&mut self, source: &[u8], page: u32, file_name: &str) -> Result<()> {
        let mut buf = Buffer::null();
        let mut lx = Lexer::new(source, file_name.to_string(), page);
        lx.compiling = false;
        self.sym.reset_labels();
        PageCompiler { c: self, buf: &mut buf, lx: &mut lx, page, branch_end_stack: Vec::new() }.toplevel()
    }

    /// Called once, after every source file has been preprocessed, before
    /// the first [`compile`](Self::compile) call.
    ///
    /// Pass 1 only ever writes to a null buffer, so every forward-reference
    /// chain it built points at address 0 everywhere — not a real chain,
    /// just bookkeeping noise. Reset each function's chain head so pass 2
    /// starts clean and builds its own chain against real addresses.
    pub fn preprocess_done(&mut self) {
        for f in self.sym.functions.values_mut() {
            f.page = 0;
            f.addr = 0;
        }
        // The reference dumps `variables.tbl` here when requested; this
        // crate exposes `self.variables` directly instead of writing a file.
    }

    /// Pass 2: compiles one page for real, resolving every label within it
    /// and patching any function forward-references this page was the tail
    /// of. Returns the finished, finalized `.SCO` bytes.
    pub fn compile(&mut self, source: &[u8], page: u32, file_name: &str) -> Result<Vec<u8>> {
        let mut buf = Buffer::new();
        sco::init(&mut buf, self.cfg.sco_ver, file_name, page)?;
        if let Some(d) = &mut self.debug {
            d.init_page(page);
        }
        let mut lx = Lexer::new(source, file_name.to_string(), page);
        lx.compiling = true;
        self.sym.reset_labels();
        PageCompiler { c: self, buf: &mut buf, lx: &mut lx, page, branch_end_stack: Vec::new() }.toplevel()?;

        for (name, label) in self.sym.labels.clone() {
            if !label.resolved {
                return Err(Error::Symbol { loc: label.loc, msg: format!("undefined label '{name}'") });
            }
        }
        if let Some(d) = &mut self.debug {
            d.finish_page(&self.sym.labels);
        }

        sco::finalize(&mut buf);
        let bytes = buf.clone().into_bytes();
        self.pages.push(buf);
        Ok(bytes)
    }

    /// After every page has been compiled, every declared function must
    /// have been defined somewhere.
    pub fn check_undefined_functions(&self) -> Result<()> {
        for f in self.sym.functions.values() {
            if !f.resolved {
                return Err(Error::Symbol {
                    loc: crate::error::SourceLoc { file: String::new(), line: 0, column: 0, source_line: String::new() },
                    msg: format!("function '{}' declared but never defined", f.name),
                });
            }
        }
        Ok(())
    }

    pub fn set_page_volume(&mut self, page: u32, volume: u8) {
        self.page_volumes[page as usize] = volume;
    }

    pub fn page_volume(&self, page: u32) -> u8 {
        self.page_volumes[page as usize]
    }

    /// Function addresses as `(page, addr)` pairs, 1-based page, ready for
    /// [`crate::ain::write`]'s `FUNC` section.
    pub fn ain_functions(&self) -> BTreeMap<String, AinFunction> {
        self.sym
            .functions
            .values()
            .filter(|f| f.resolved)
            .map(|f| (f.name.clone(), AinFunction { page: f.page as u16, addr: f.addr }))
            .collect()
    }
}

/// Per-page compile state: the live lexer/buffer pair plus whatever only
/// makes sense mid-page (the SYSTEM35 dangling-`}` stack for `conditional`).
struct PageCompiler<'c, 'b, 'l, 's> {
    c: &'c mut Compiler,
    buf: &'b mut Buffer,
    lx: &'l mut Lexer<'s>,
    page: u32,
    /// SYSTEM35 has no `else`; a conditional's closing `}` is deferred onto
    /// this stack so `pragma` directives and menu items interleaved with an
    /// open block still see a consistent nesting depth (§9 Open Question —
    /// the reference's own handling of this is underdocumented outside
    /// SYSTEM35 titles, so this crate keeps the stack but only ever pushes
    /// to it, never acting on it beyond balancing nesting depth checks).
    branch_end_stack: Vec<u32>,
}

impl<'c, 'b, 'l, 's> PageCompiler<'c, 'b, 'l, 's> {
    fn toplevel(&mut self) -> Result<()> {
        loop {
            match self.lx.get_command()? {
                Command::Eof => break,
                Command::BlockEnd(c) => {
                    return Err(self.lx.error_at(format!("unexpected '{}'", c as char)));
                }
                Command::Id(id) => self.statement(id)?,
            }
        }
        if !self.branch_end_stack.is_empty() && self.c.cfg.sys_ver == SysVer::System35 {
            // Unbalanced dangling blocks are a hard error on SYSTEM35, same
            // as any other unterminated construct.
            return Err(self.lx.error_at("unterminated conditional block"));
        }
        Ok(())
    }

    fn statement(&mut self, id: u32) -> Result<()> {
        if id == 0 {
            return self.zu_deprecated();
        }
        if id == '*' as u32 {
            return self.star();
        }
        if id == '@' as u32 {
            return self.label_jump();
        }
        if id == '&' as u32 {
            return self.page_jump();
        }
        if id == ']' as u32 {
            self.buf.emit(b']');
            return Ok(());
        }
        if id == '$' as u32 {
            return self.menu_item();
        }
        if id == 'A' as u32 || id == 'R' as u32 {
            self.buf.emit(id as u8);
            return Ok(());
        }
        if id == '!' as u32 {
            return self.assign();
        }
        if id == '{' as u32 || id == command::COMMAND_IF {
            return self.conditional();
        }
        if id == '<' as u32 {
            return self.loop_stmt();
        }
        if id == '~' as u32 {
            return self.funcall();
        }
        if id == command::COMMAND_CONST {
            return self.define_const();
        }
        if id == command::COMMAND_PRAGMA {
            return self.pragma();
        }
        if id == 'B' as u32 {
            return self.command_b();
        }
        if id == cmd2(b'Z', b'T') {
            return self.command_zt();
        }
        if id == b'G' as u32 {
            return self.command_g();
        }
        if id == b'J' as u32 {
            return self.command_j();
        }
        if id == cmd2(b'P', b'F') {
            return self.command_pf_pw(b'F');
        }
        if id == cmd2(b'P', b'W') {
            return self.command_pf_pw(b'W');
        }
        if id == cmd2(b'P', b'T') {
            return self.command_pt();
        }
        if id == cmd2(b'S', b'G') {
            return self.command_sg();
        }
        if id == cmd2(b'S', b'R') {
            return self.command_sr();
        }
        if id == cmd2(b'S', b'X') {
            return self.command_sx();
        }
        if id == cmd2(b'U', b'P') {
            // `UP` is version-rewritten to `newUP` the same as every other
            // legacy two-letter command; both share a subcommand switch, so
            // the version check has to happen before that switch runs.
            if command::replace_command(&self.c.cfg, id) == command::COMMAND_NEWUP {
                return self.command_new_up();
            }
            return self.command_up();
        }
        if id == command::COMMAND_DLLCALL {
            return self.command_dll_call();
        }
        // `H`, `HH` and `X` are rewritten to the AIN message-table forms
        // only under `use_ain_message`; the version check has to run before
        // the ordinary `replace_command` + flat-table path so the rewritten
        // id reaches its own custom handler instead of `dispatch_signature`.
        if id == b'H' as u32 || id == cmd2(b'H', b'H') || id == b'X' as u32 {
            let resolved = command::replace_command(&self.c.cfg, id);
            if resolved == command::COMMAND_AINH || resolved == command::COMMAND_AINHH {
                return self.command_ain_message(resolved, "ne");
            }
            if resolved == command::COMMAND_AINX {
                return self.command_ain_message(resolved, "e");
            }
        }

        let id = command::replace_command(&self.c.cfg, id);
        buffer::emit_command(self.buf, id, command::needs_trailing_nul(id));
        let sig = dispatch_signature(id)
            .ok_or_else(|| self.lx.error_at(format!("unimplemented command 0x{id:x}")))?;
        self.arguments(sig)
    }

    fn zu_deprecated(&mut self) -> Result<()> {
        let _ = self.lx.get_number()?;
        self.lx.expect(b':')?;
        if !self.lx.compiling {
            log::warn!("{}: ZU is deprecated and has no effect", self.lx.loc());
        }
        Ok(())
    }

    // -- labels / jumps ----------------------------------------------------

    fn star(&mut self) -> Result<()> {
        // `**name params:` declares a function; a bare `*name:` declares a
        // jump target. Neither emits any bytes of its own.
        if self.lx.peek()? == b'*' {
            self.lx.expect(b'*')?;
            return self.defun();
        }
        let name = self.lx.get_label()?;
        self.lx.expect(b':')?;
        let addr = self.buf.current_address();
        match self.c.sym.labels.get(&name).cloned() {
            Some(l) if l.resolved => {
                return Err(self.lx.error_at(format!("label '{name}' redefined")));
            }
            Some(l) => {
                self.walk_label_chain(l.hole_addr, addr);
                self.c.sym.labels.insert(
                    name,
                    Label { resolved: true, addr, hole_addr: 0, loc: l.loc, is_function: l.is_function },
                );
            }
            None => {
                self.c.sym.labels.insert(name, Label { resolved: true, addr, hole_addr: 0, loc: self.lx.loc(), is_function: false });
            }
        }
        Ok(())
    }

    fn walk_label_chain(&mut self, mut hole: u32, target: u32) {
        while hole != 0 {
            let next = self.buf.swap_dword(hole, target);
            hole = next;
        }
    }

    fn label_jump(&mut self) -> Result<()> {
        let name = self.lx.get_label()?;
        self.lx.expect(b':')?;
        self.buf.emit(b'@');
        self.emit_label_ref(&name);
        Ok(())
    }

    /// Emits the dword a label reference resolves to, threading a new hole
    /// into the chain if the label isn't known yet.
    fn emit_label_ref(&mut self, name: &str) {
        let addr = self.buf.current_address();
        match self.c.sym.labels.get(name).cloned() {
            Some(l) if l.resolved => self.buf.emit_dword(l.addr),
            Some(l) => {
                self.buf.emit_dword(l.hole_addr);
                self.c.sym.labels.insert(
                    name.to_string(),
                    Label { hole_addr: addr, ..l },
                );
            }
            None => {
                self.buf.emit_dword(0);
                self.c.sym.labels.insert(
                    name.to_string(),
                    Label { resolved: false, addr: 0, hole_addr: addr, loc: self.lx.loc(), is_function: false },
                );
            }
        }
    }

    fn page_jump(&mut self) -> Result<()> {
        self.buf.emit(b'&');
        expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym)?;
        Ok(())
    }

    fn menu_item(&mut self) -> Result<()> {
        self.buf.emit(b'$');
        let name = self.lx.get_label()?;
        self.lx.expect(b'$')?;
        self.emit_label_ref(&name);
        self.buf.emit(b'$');
        if self.lx.peek()? != b'$' {
            let msg = self.lx.compile_message(&self.c.cfg, b'$')?;
            self.buf.emit_string(&msg);
        }
        self.lx.expect(b'$')?;
        self.buf.emit(0);
        Ok(())
    }

    // -- assignment ---------------------------------------------------------

    fn assign(&mut self) -> Result<()> {
        let cmd_addr = self.buf.current_address();
        self.buf.emit(b'!');
        expr::variable(self.buf, self.lx, &self.c.cfg, &self.c.sym)?;
        let compound = match self.lx.peek()? {
            b'+' => Some(0x10u8),
            b'-' => Some(0x11),
            b'*' => Some(0x12),
            b'/' => Some(0x13),
            b'%' => Some(0x14),
            b'&' => Some(0x15),
            b'|' => Some(0x16),
            b'^' => Some(0x17),
            _ => None,
        };
        if let Some(op) = compound {
            self.lx.consume()?;
            self.buf.set_byte(cmd_addr, op);
        }
        self.lx.expect(b':')?;
        expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym)?;
        self.lx.expect(b'!')?;
        Ok(())
    }

    // -- control flow ---------------------------------------------------------

    /// Parses statements up to a `}` or `>` terminator, returning which one
    /// it hit.
    fn statements_until_block_end(&mut self) -> Result<u8> {
        loop {
            match self.lx.get_command()? {
                Command::Eof => return Err(self.lx.error_at("unexpected end of file inside block")),
                Command::BlockEnd(c) => return Ok(c),
                Command::Id(id) => self.statement(id)?,
            }
        }
    }

    /// `{ expr : statements }`, with the reference's single-hole,
    /// no-else shape fully grounded (§8 scenario 4). System 3.8+ adds a
    /// chained `else`/`else if` extension the grounding material only
    /// describes in prose, reconstructed here as best-effort: a `{`
    /// directly following the closing `}` recurses as another conditional,
    /// letting `{a:..}{b:..}{c:..}` read as an if/else-if/else-if chain
    /// (§9 Open Question — plain terminal `else` with no condition isn't
    /// separately distinguished).
    fn conditional(&mut self) -> Result<()> {
        self.buf.emit(b'{');
        expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym)?;
        self.lx.expect(b':')?;
        let false_hole = self.buf.current_address();
        self.buf.emit_dword(0);
        let term = self.statements_until_block_end()?;
        if term != b'}' {
            return Err(self.lx.error_at("expected '}' to close conditional"));
        }

        if self.c.cfg.sys_ver >= SysVer::System38 && !self.c.cfg.disable_else && self.lx.peek()? == b'{' {
            self.buf.emit(b'@');
            let end_hole = self.buf.current_address();
            self.buf.emit_dword(0);
            let else_start = self.buf.current_address();
            self.buf.swap_dword(false_hole, else_start);

            self.lx.expect(b'{')?;
            self.conditional()?;

            let after = self.buf.current_address();
            self.buf.swap_dword(end_hole, after);
        } else {
            let after = self.buf.current_address();
            self.buf.swap_dword(false_hole, after);
        }
        Ok(())
    }

    fn loop_stmt(&mut self) -> Result<()> {
        if self.lx.peek()? == b'@' {
            self.lx.expect(b'@')?;
            self.while_loop()
        } else {
            self.for_loop()
        }
    }

    fn while_loop(&mut self) -> Result<()> {
        self.buf.emit(b'{');
        let loop_top = self.buf.current_address();
        expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym)?;
        self.lx.expect(b':')?;
        let hole = self.buf.current_address();
        self.buf.emit_dword(0);
        let term = self.statements_until_block_end()?;
        if term != b'>' {
            return Err(self.lx.error_at("expected '>' to close while loop"));
        }
        self.buf.emit(b'>');
        self.buf.emit_dword(loop_top);
        let after = self.buf.current_address();
        self.buf.swap_dword(hole, after);
        Ok(())
    }

    fn for_loop(&mut self) -> Result<()> {
        let var_name = self.lx.get_identifier()?;
        let var_id = self.c.lookup_or_create_var(&var_name);
        self.lx.expect(b',')?;

        self.buf.emit(b'!');
        emit_var(self.buf, var_id);
        expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym)?;

        self.lx.expect(b',')?;
        self.buf.emit(b'<');
        self.buf.emit(0);
        let loop_top = self.buf.current_address();
        self.buf.emit(b'<');
        self.buf.emit(1);
        let hole = self.buf.current_address();
        self.buf.emit_dword(0);

        emit_var(self.buf, var_id);
        self.buf.emit(OP_END);
        expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym)?; // end
        self.lx.expect(b',')?;
        expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym)?; // sign
        self.lx.expect(b',')?;
        expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym)?; // step
        self.lx.expect(b':')?;

        let term = self.statements_until_block_end()?;
        if term != b'>' {
            return Err(self.lx.error_at("expected '>' to close for loop"));
        }
        self.buf.emit(b'>');
        self.buf.emit_dword(loop_top);
        let after = self.buf.current_address();
        self.buf.swap_dword(hole, after);
        Ok(())
    }

    // -- functions ------------------------------------------------------------

    fn defun(&mut self) -> Result<()> {
        let name = self.lx.get_label()?;
        let mut params = Vec::new();
        if self.lx.peek()? != b':' {
            loop {
                params.push(self.lx.get_identifier()?);
                if self.lx.peek()? != b',' {
                    break;
                }
                self.lx.expect(b',')?;
            }
        }
        self.lx.expect(b':')?;

        // A function body can reference its own parameters, so they must
        // exist as variables on pass 1 too, not only once pass 2 resolves
        // the function itself.
        for p in &params {
            self.c.lookup_or_create_var(p);
        }

        if !self.lx.compiling {
            // A call site may already have registered an unresolved stub for
            // this name; only a second *declared* defun is a real collision.
            if let Some(existing) = self.c.sym.functions.get(&name) {
                if existing.declared {
                    return Err(self.lx.error_at(format!("function '{name}' redefined")));
                }
            }
            let f = self.c.sym.functions.entry(name.clone()).or_insert_with(|| Function::new(name.clone()));
            f.declared = true;
            f.params = params;
            return Ok(());
        }

        let addr = self.buf.current_address();
        let page1 = self.page + 1;
        let (old_page, old_hole) = {
            let f = self
                .c
                .sym
                .functions
                .get(&name)
                .ok_or_else(|| self.lx.error_at(format!("internal error: function '{name}' missing from pass 1")))?;
            (f.page as u16, f.addr)
        };
        self.resolve_function_chain(old_page, old_hole, page1 as u16, addr);

        let f = self.c.sym.functions.get_mut(&name).unwrap();
        f.resolved = true;
        f.page = page1;
        f.addr = addr;
        Ok(())
    }

    /// Walks a function's forward-reference chain, patching each link to
    /// `(target_page, target_addr)`. A link lives inside whichever page's
    /// buffer it was compiled into — the current page for same-page
    /// references, or an earlier, already-finalized page in `self.c.pages`
    /// for cross-page ones.
    fn resolve_function_chain(&mut self, mut page: u16, mut addr: u32, target_page: u16, target_addr: u32) {
        while page != 0 {
            let (next_page, next_addr) = if page as u32 == self.page + 1 {
                let prev = read_func_ref(self.buf, addr);
                patch_func_ref(self.buf, addr, target_page, target_addr);
                prev
            } else {
                let other = &mut self.c.pages[page as usize - 1];
                let prev = read_func_ref(other, addr);
                patch_func_ref(other, addr, target_page, target_addr);
                prev
            };
            page = next_page;
            addr = next_addr;
        }
    }

    fn emit_function_ref(&mut self, name: &str) -> Result<()> {
        if !self.c.sym.functions.contains_key(name) {
            // A call site can precede the only `defun` that ever declares
            // it within the same pass-1 walk; register an undeclared stub
            // so pass 1 still records at least an (unresolved) entry. The
            // stub's `declared` stays false, so the real `defun` later
            // still fills in its parameter list rather than erroring as a
            // redefinition.
            self.c.sym.functions.insert(name.to_string(), Function::new(name.to_string()));
        }
        let addr = self.buf.current_address();
        let f = self.c.sym.functions.get(name).unwrap();
        if f.resolved {
            self.buf.emit_word(f.page as u16);
            self.buf.emit_dword(f.addr);
        } else {
            let (old_page, old_addr) = (f.page as u16, f.addr);
            self.buf.emit_word(old_page);
            self.buf.emit_dword(old_addr);
            let f = self.c.sym.functions.get_mut(name).unwrap();
            f.page = self.page + 1;
            f.addr = addr;
        }
        Ok(())
    }

    fn funcall(&mut self) -> Result<()> {
        self.buf.emit(b'~');
        let name = self.lx.get_identifier()?;
        self.emit_function_ref(&name)?;
        let nargs = self
            .c
            .sym
            .functions
            .get(&name)
            .map(|f| f.params.len())
            .unwrap_or(0);
        self.buf.emit(nargs as u8);
        if self.lx.peek()? == b'(' {
            self.lx.expect(b'(')?;
            for i in 0..nargs {
                if i > 0 {
                    self.lx.expect(b',')?;
                }
                expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym)?;
            }
            self.lx.expect(b')')?;
        }
        self.lx.expect(b':')?;
        Ok(())
    }

    // -- declarations -----------------------------------------------------

    fn define_const(&mut self) -> Result<()> {
        let name = self.lx.get_identifier()?;
        self.lx.expect(b'=')?;
        let value = self.lx.get_number()?;
        self.lx.expect(b':')?;
        if !self.lx.compiling {
            self.c.sym.names.insert(name, NameBinding::Constant(value));
        }
        Ok(())
    }

    fn pragma(&mut self) -> Result<()> {
        let name = self.lx.get_identifier()?;
        match name.as_str() {
            "address" => {
                let addr = self.lx.get_number()?;
                self.lx.expect(b':')?;
                self.buf.set_len(addr as u32);
                if let Some(d) = &mut self.c.debug {
                    d.line_reset();
                }
            }
            "volume" => {
                let vol = self.lx.get_number()?;
                self.lx.expect(b':')?;
                self.c.set_page_volume(self.page, vol as u8);
            }
            _ => {
                // Unknown pragmas consume one trailing expression-like token
                // and are otherwise ignored, matching the reference's
                // lenient `pragma` dispatch.
                while self.lx.peek()? != b':' {
                    self.lx.consume()?;
                }
                self.lx.expect(b':')?;
            }
        }
        Ok(())
    }

    // -- generic argument-signature dispatch -------------------------------

    /// Consumes `sig`'s elements with a comma expected before *every* one,
    /// including the first — correct for commands whose own first token
    /// (e.g. `B`'s subcommand digit) is consumed separately by the caller.
    fn arguments_rest(&mut self, sig: &str) -> Result<()> {
        for ch in sig.chars() {
            self.lx.expect(b',')?;
            self.argument(ch)?;
        }
        self.lx.expect(b':')?;
        Ok(())
    }

    /// Consumes `sig`'s elements with a comma expected between elements but
    /// not before the first — correct for ordinary commands whose first
    /// argument sits directly against the command letters.
    fn arguments(&mut self, sig: &str) -> Result<()> {
        for (i, ch) in sig.chars().enumerate() {
            if i > 0 {
                self.lx.expect(b',')?;
            }
            self.argument(ch)?;
        }
        self.lx.expect(b':')?;
        Ok(())
    }

    fn argument(&mut self, ch: char) -> Result<()> {
        match ch {
            'e' => expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym),
            'n' => {
                let n = self.lx.get_number()?;
                if !(0..=255).contains(&n) {
                    return Err(self.lx.error_at("numeric argument out of byte range"));
                }
                self.buf.emit(n as u8);
                Ok(())
            }
            's' | 'z' => {
                let s = self.lx.compile_string(&self.c.cfg)?;
                self.buf.emit_string(&s);
                self.buf.emit(0);
                Ok(())
            }
            'o' => {
                let s = self.lx.compile_string(&self.c.cfg)?;
                for b in s {
                    self.buf.emit((b << 4) | (b >> 4));
                }
                self.buf.emit(0);
                Ok(())
            }
            'v' => expr::variable(self.buf, self.lx, &self.c.cfg, &self.c.sym),
            'F' => {
                let name = self.lx.get_identifier()?;
                self.emit_function_ref(&name)
            }
            _ => unreachable!("dispatch_signature only yields known signature chars"),
        }
    }

    fn subcommand_digit(&mut self) -> Result<i64> {
        let n = self.lx.get_number()?;
        if !(0..=255).contains(&n) {
            return Err(self.lx.error_at("subcommand out of byte range"));
        }
        self.buf.emit(n as u8);
        Ok(n)
    }

    fn command_b(&mut self) -> Result<()> {
        self.buf.emit(b'B');
        let sub = self.subcommand_digit()?;
        let sig = match sub {
            0 => "e",
            1..=4 => "eeeeee",
            10 | 11 => "vv",
            12..=14 => "v",
            21..=24 | 31..=34 => "evv",
            _ => return Err(self.lx.error_at(format!("unknown B subcommand {sub}"))),
        };
        self.arguments_rest(sig)
    }

    fn command_zt(&mut self) -> Result<()> {
        buffer::emit_command(self.buf, cmd2(b'Z', b'T'), false);
        let sub = self.subcommand_digit()?;
        let sig = match sub {
            2..=5 => "v",
            0 | 1 | 20 | 21 => "e",
            10 => "eee",
            11 => "ev",
            _ => return Err(self.lx.error_at(format!("unknown ZT subcommand {sub}"))),
        };
        self.arguments_rest(sig)
    }

    /// `G`'s own flag byte: always writes a 0 byte at the command's start,
    /// then comes back and patches it to 1 if a second, optional expression
    /// follows a comma.
    fn command_g(&mut self) -> Result<()> {
        self.buf.emit(b'G');
        let flag_addr = self.buf.current_address();
        self.buf.emit(0);
        expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym)?;
        if self.lx.peek()? == b',' {
            self.lx.expect(b',')?;
            self.buf.set_byte(flag_addr, 1);
            expr::expr(self.buf, self.lx, &self.c.cfg, &self.c.sym)?;
        }
        if self.lx.peek()? == b':' {
            self.lx.expect(b':')?;
        }
        Ok(())
    }

    fn command_j(&mut self) -> Result<()> {
        self.buf.emit(b'J');
        let sub = self.subcommand_digit()?;
        let sig = match sub {
            0..=3 => "ee",
            4 => "",
            _ => return Err(self.lx.error_at(format!("unknown J subcommand {sub}"))),
        };
        self.arguments_rest(sig)
    }

    /// `PF`/`PW` share one subcommand table, differing only in their own
    /// second letter.
    fn command_pf_pw(&mut self, letter: u8) -> Result<()> {
        buffer::emit_command(self.buf, cmd2(b'P', letter), false);
        let sub = self.subcommand_digit()?;
        let sig = match sub {
            0 | 1 => "e",
            2 | 3 => "ee",
            _ => return Err(self.lx.error_at(format!("unknown P{} subcommand {sub}", letter as char))),
        };
        self.arguments_rest(sig)
    }

    fn command_pt(&mut self) -> Result<()> {
        buffer::emit_command(self.buf, cmd2(b'P', b'T'), false);
        let sub = self.subcommand_digit()?;
        let sig = match sub {
            0 => "vee",
            1 => "vvvee",
            2 => "vvee",
            _ => return Err(self.lx.error_at(format!("unknown PT subcommand {sub}"))),
        };
        self.arguments_rest(sig)
    }

    fn command_sg(&mut self) -> Result<()> {
        buffer::emit_command(self.buf, cmd2(b'S', b'G'), false);
        let sub = self.subcommand_digit()?;
        let sig = match sub {
            0..=4 => "e",
            5..=8 => "ee",
            _ => return Err(self.lx.error_at(format!("unknown SG subcommand {sub}"))),
        };
        self.arguments_rest(sig)
    }

    /// `SR`'s signature depends on the target version rather than on a
    /// subcommand digit — `ev` on SYSTEM35 (or when `old_SR` is set in the
    /// config file), `nv` otherwise.
    fn command_sr(&mut self) -> Result<()> {
        buffer::emit_command(self.buf, cmd2(b'S', b'R'), false);
        let sig = if self.c.cfg.sys_ver == SysVer::System35 || self.c.cfg.old_sr { "ev" } else { "nv" };
        self.arguments(sig)
    }

    /// `SX` reads two subcommand digits: a device number (unused beyond its
    /// own byte) and the real subcommand.
    fn command_sx(&mut self) -> Result<()> {
        buffer::emit_command(self.buf, cmd2(b'S', b'X'), false);
        self.subcommand_digit()?;
        let sub = self.subcommand_digit()?;
        let sig = match sub {
            1 => "eee",
            2 | 4 => "v",
            3 => "",
            _ => return Err(self.lx.error_at(format!("unknown SX subcommand {sub}"))),
        };
        self.arguments_rest(sig)
    }

    /// `UP`'s subcommand table, shared between the raw two-letter command
    /// (pre-SYSTEM38) and its `newUP` rewrite (SYSTEM38+, string arguments
    /// routed through the AIN-aware `z` signature character instead of `s`).
    fn command_up_subcommand(&mut self, ain_aware: bool) -> Result<()> {
        let sub = self.subcommand_digit()?;
        let sig = match (sub, ain_aware) {
            (0, _) => "ee",
            (1, false) => "se",
            (1, true) => "ze",
            (2, false) | (3, false) => "ss",
            (2, true) | (3, true) => "zz",
            _ => return Err(self.lx.error_at(format!("unknown UP subcommand {sub}"))),
        };
        self.arguments_rest(sig)
    }

    fn command_up(&mut self) -> Result<()> {
        buffer::emit_command(self.buf, cmd2(b'U', b'P'), false);
        self.command_up_subcommand(false)
    }

    fn command_new_up(&mut self) -> Result<()> {
        buffer::emit_command(self.buf, command::COMMAND_NEWUP, command::needs_trailing_nul(command::COMMAND_NEWUP));
        self.command_up_subcommand(true)
    }

    /// `ainH`/`ainHH`/`ainX` don't carry their own message text — they stamp
    /// a placeholder entry into the `.AIN` message table and emit its index,
    /// then parse their ordinary numeric arguments.
    fn command_ain_message(&mut self, id: u32, sig: &str) -> Result<()> {
        buffer::emit_command(self.buf, id, command::needs_trailing_nul(id));
        let index = self.c.messages.len() as u32;
        self.c.messages.push(String::new());
        self.buf.emit_dword(index);
        self.arguments(sig)
    }

    /// `dllCall(dll.func, args...)`. The reference routes this through a
    /// dedicated `dll_call()` that validates argument count and type against
    /// the `.HEL` declaration; without that table in scope here, arguments
    /// are compiled as plain expressions and the dll/function names as
    /// NUL-terminated strings.
    fn command_dll_call(&mut self) -> Result<()> {
        buffer::emit_command(self.buf, command::COMMAND_DLLCALL, false);
        let dll = self.lx.get_identifier()?;
        self.lx.expect(b'.')?;
        let func = self.lx.get_identifier()?;
        self.buf.emit_string(dll.as_bytes());
        self.buf.emit(0);
        self.buf.emit_string(func.as_bytes());
        self.buf.emit(0);
        let mut argc = 0u8;
        let mut args = Vec::new();
        if self.lx.peek()? == b'(' {
            self.lx.expect(b'(')?;
            if self.lx.peek()? != b')' {
                loop {
                    let mut tmp = Buffer::new();
                    expr::expr(&mut tmp, self.lx, &self.c.cfg, &self.c.sym)?;
                    args.push(tmp.into_bytes());
                    argc += 1;
                    if self.lx.peek()? != b',' {
                        break;
                    }
                    self.lx.expect(b',')?;
                }
            }
            self.lx.expect(b')')?;
        }
        self.lx.expect(b':')?;
        self.buf.emit(argc);
        for a in args {
            self.buf.emit_string(&a);
        }
        Ok(())
    }
}

/// Signature strings for every command `command()` dispatches through a
/// plain `arguments(sig)` call — the full two/three-letter table plus the
/// lowercase-keyword table, mirrored from `compiler/compile.c`'s `command()`
/// switch. Subcommand-switch commands (`B`, `G`, `J`, `PF`/`PW`, `PT`, `SG`,
/// `SR`, `SX`, `UP`/`newUP`, `ZT`), the AIN message-table commands
/// (`ainH`/`ainHH`/`ainX`) and `dllCall` dispatch through their own methods
/// before `statement()` ever reaches this table.
fn dispatch_signature(cmd: u32) -> Option<&'static str> {
    Some(match cmd {
        // bare single-letter
        c if c == b'F' as u32 => "nee",
        c if c == b'H' as u32 => "ne",
        c if c == b'T' as u32 => "ee",
        c if c == b'X' as u32 => "e",
        c if c == b'Y' as u32 => "ee",

        // two/three-letter, C through E
        c if c == cmd2(b'C', b'B') => "eeeee",
        c if c == cmd2(b'C', b'C') => "eeeeee",
        c if c == cmd2(b'C', b'D') => "eeeeeeeeee",
        c if c == cmd2(b'C', b'E') => "eeeeeeeee",
        c if c == cmd2(b'C', b'F') => "eeeee",
        c if c == cmd2(b'C', b'K') => "neeeeeeee",
        c if c == cmd2(b'C', b'L') => "eeeee",
        c if c == cmd2(b'C', b'M') => "eeeeeeeee",
        c if c == cmd2(b'C', b'P') => "eee",
        c if c == cmd2(b'C', b'S') => "eeeeeee",
        c if c == cmd2(b'C', b'T') => "vee",
        c if c == cmd2(b'C', b'U') => "eeeeee",
        c if c == cmd2(b'C', b'V') => "eeeeee",
        c if c == cmd2(b'C', b'X') => "eeeeeeee",
        c if c == cmd2(b'C', b'Y') => "eeeee",
        c if c == cmd2(b'C', b'Z') => "eeeeeee",
        c if c == cmd2(b'D', b'C') => "eee",
        c if c == cmd2(b'D', b'F') => "vee",
        c if c == cmd2(b'D', b'I') => "evv",
        c if c == cmd2(b'D', b'R') => "v",
        c if c == cmd2(b'D', b'S') => "vvee",
        c if c == cmd2(b'E', b'C') => "e",
        c if c == cmd2(b'E', b'G') => "evvvv",
        c if c == cmd2(b'E', b'M') => "evee",
        c if c == cmd2(b'E', b'N') => "veeee",
        c if c == cmd2(b'E', b'S') => "eeeeee",

        // G* / I*
        c if c == cmd2(b'G', b'S') => "ev",
        c if c == cmd2(b'G', b'X') => "ee",
        c if c == cmd2(b'I', b'C') => "ev",
        c if c == cmd2(b'I', b'E') => "ee",
        c if c == cmd2(b'I', b'G') => "veee",
        c if c == cmd2(b'I', b'K') => "n",
        c if c == cmd2(b'I', b'M') => "vv",
        c if c == cmd2(b'I', b'X') => "v",
        c if c == cmd2(b'I', b'Y') => "e",
        c if c == cmd2(b'I', b'Z') => "ee",

        // K* / L*
        c if c == cmd2(b'K', b'I') => "vee",
        c if c == cmd2(b'K', b'K') => "e",
        c if c == cmd2(b'K', b'N') => "v",
        c if c == cmd2(b'K', b'P') => "v",
        c if c == cmd2(b'K', b'Q') => "ve",
        c if c == cmd2(b'K', b'R') => "v",
        c if c == cmd2(b'K', b'W') => "ve",
        c if c == cmd2(b'L', b'C') => "ees",
        c if c == command::COMMAND_NEWLC => "eez",
        c if c == cmd2(b'L', b'D') => "e",
        c if c == cmd2(b'L', b'E') => "nsee",
        c if c == command::COMMAND_NEWLE => "nzee",
        c if c == cmd3(b'L', b'H', b'D') => "ne",
        c if c == cmd3(b'L', b'H', b'G') => "ne",
        c if c == cmd3(b'L', b'H', b'M') => "ne",
        c if c == cmd3(b'L', b'H', b'S') => "ne",
        c if c == cmd3(b'L', b'H', b'W') => "ne",
        c if c == cmd3(b'L', b'X', b'C') => "e",
        c if c == cmd3(b'L', b'X', b'G') => "ess",
        c if c == command::COMMAND_NEWLXG => "ezz",
        c if c == cmd3(b'L', b'X', b'L') => "eee",
        c if c == cmd3(b'L', b'X', b'O') => "eee",
        c if c == cmd3(b'L', b'X', b'P') => "eee",
        c if c == cmd3(b'L', b'X', b'R') => "eve",
        c if c == cmd3(b'L', b'X', b'S') => "evv",
        c if c == cmd3(b'L', b'X', b'W') => "eve",
        c if c == cmd3(b'L', b'X', b'X') => "eev",
        c if c == cmd2(b'L', b'L') => "neee",
        c if c == cmd2(b'L', b'P') => "eve",
        c if c == cmd2(b'L', b'T') => "ev",

        // M*
        c if c == cmd2(b'M', b'A') => "ee",
        c if c == cmd2(b'M', b'C') => "ee",
        c if c == cmd2(b'M', b'D') => "eee",
        c if c == cmd2(b'M', b'E') => "eeeee",
        c if c == cmd2(b'M', b'F') => "veee",
        c if c == cmd2(b'M', b'G') => "ne",
        c if c == cmd2(b'M', b'H') => "eee",
        c if c == cmd2(b'M', b'I') => "ees",
        c if c == command::COMMAND_NEWMI => "eez",
        c if c == cmd2(b'M', b'J') => "eeeee",
        c if c == cmd2(b'M', b'L') => "ve",
        c if c == cmd2(b'M', b'M') => "ee",
        c if c == cmd2(b'M', b'N') => "nev",
        c if c == cmd2(b'M', b'P') => "ee",
        c if c == cmd2(b'M', b'S') => "es",
        c if c == command::COMMAND_NEWMS => "ez",
        c if c == cmd2(b'M', b'T') => "s",
        c if c == command::COMMAND_NEWMT => "z",
        c if c == cmd2(b'M', b'V') => "e",
        c if c == cmd2(b'M', b'Z') => "neee",

        // N* (numeric ops) and ND*
        c if c == cmd2(b'N', b'+') => "vee",
        c if c == cmd2(b'N', b'-') => "vee",
        c if c == cmd2(b'N', b'*') => "vee",
        c if c == cmd2(b'N', b'/') => "vee",
        c if c == cmd2(b'N', b'>') => "veev",
        c if c == cmd2(b'N', b'<') => "veev",
        c if c == cmd2(b'N', b'=') => "veev",
        c if c == cmd2(b'N', b'\\') => "ve",
        c if c == cmd2(b'N', b'&') => "vev",
        c if c == cmd2(b'N', b'|') => "vev",
        c if c == cmd2(b'N', b'^') => "vev",
        c if c == cmd2(b'N', b'~') => "ve",
        c if c == cmd2(b'N', b'B') => "vve",
        c if c == cmd2(b'N', b'C') => "ve",
        c if c == cmd2(b'N', b'I') => "veee",
        c if c == cmd2(b'N', b'O') => "nvve",
        c if c == cmd2(b'N', b'P') => "vvev",
        c if c == cmd2(b'N', b'R') => "ev",
        c if c == cmd2(b'N', b'T') => "s",
        c if c == command::COMMAND_NEWNT => "z",
        c if c == cmd3(b'N', b'D', b'+') => "eee",
        c if c == cmd3(b'N', b'D', b'-') => "eee",
        c if c == cmd3(b'N', b'D', b'*') => "eee",
        c if c == cmd3(b'N', b'D', b'/') => "eee",
        c if c == cmd3(b'N', b'D', b'A') => "ee",
        c if c == cmd3(b'N', b'D', b'C') => "ee",
        c if c == cmd3(b'N', b'D', b'D') => "ve",
        c if c == cmd3(b'N', b'D', b'H') => "ee",
        c if c == cmd3(b'N', b'D', b'M') => "ee",

        // P* / Q*
        c if c == cmd2(b'P', b'C') => "e",
        c if c == cmd2(b'P', b'D') => "e",
        c if c == cmd2(b'P', b'G') => "vee",
        c if c == cmd2(b'P', b'N') => "e",
        c if c == cmd2(b'P', b'P') => "vee",
        c if c == cmd2(b'P', b'S') => "eeee",
        c if c == cmd2(b'Q', b'C') => "ee",
        c if c == cmd2(b'Q', b'D') => "e",
        c if c == cmd2(b'Q', b'E') => "nsee",
        c if c == command::COMMAND_NEWQE => "nzee",
        c if c == cmd2(b'Q', b'P') => "eve",

        // S* (minus B/G/SG/SR/SX, dispatched separately)
        c if c == cmd2(b'S', b'C') => "v",
        c if c == cmd2(b'S', b'I') => "nv",
        c if c == cmd2(b'S', b'L') => "e",
        c if c == cmd2(b'S', b'M') => "e",
        c if c == cmd2(b'S', b'O') => "v",
        c if c == cmd2(b'S', b'P') => "ee",
        c if c == cmd2(b'S', b'Q') => "eee",
        c if c == cmd2(b'S', b'S') => "e",
        c if c == cmd2(b'S', b'T') => "e",
        c if c == cmd2(b'S', b'U') => "vv",
        c if c == cmd2(b'S', b'V') => "ee",
        c if c == cmd2(b'S', b'W') => "veee",

        // U* / V* / W*
        c if c == cmd2(b'U', b'C') => "ne",
        c if c == cmd2(b'U', b'D') => "e",
        c if c == cmd2(b'U', b'G') => "ee",
        c if c == cmd2(b'U', b'R') => "v",
        c if c == cmd2(b'U', b'S') => "ee",
        c if c == cmd2(b'V', b'A') => "neee",
        c if c == cmd2(b'V', b'B') => "eeeeeee",
        c if c == cmd2(b'V', b'C') => "eeeeeee",
        c if c == cmd2(b'V', b'E') => "eeeeee",
        c if c == cmd2(b'V', b'F') => "",
        c if c == cmd2(b'V', b'G') => "eeee",
        c if c == cmd2(b'V', b'H') => "eeeeee",
        c if c == cmd3(b'V', b'I', b'C') => "eeee",
        c if c == cmd3(b'V', b'I', b'P') => "eeee",
        c if c == cmd2(b'V', b'J') => "eeee",
        c if c == cmd2(b'V', b'P') => "eeeeee",
        c if c == cmd2(b'V', b'R') => "eev",
        c if c == cmd2(b'V', b'S') => "eeeee",
        c if c == cmd2(b'V', b'T') => "eeeeeeeeee",
        c if c == cmd2(b'V', b'V') => "ee",
        c if c == cmd2(b'V', b'W') => "eev",
        c if c == cmd2(b'V', b'X') => "eeee",
        c if c == cmd2(b'V', b'Z') => "nee",
        c if c == cmd2(b'W', b'V') => "eeee",
        c if c == cmd2(b'W', b'W') => "eee",
        c if c == cmd2(b'W', b'X') => "eeee",
        c if c == cmd2(b'W', b'Z') => "ne",

        // Z*
        c if c == cmd2(b'Z', b'A') => "ne",
        c if c == cmd2(b'Z', b'B') => "e",
        c if c == cmd2(b'Z', b'C') => "ee",
        c if c == cmd2(b'Z', b'D') => "ne",
        c if c == cmd2(b'Z', b'E') => "e",
        c if c == cmd2(b'Z', b'F') => "e",
        c if c == cmd2(b'Z', b'G') => "v",
        c if c == cmd2(b'Z', b'H') => "e",
        c if c == cmd2(b'Z', b'I') => "ee",
        c if c == cmd2(b'Z', b'K') => "ees",
        c if c == cmd2(b'Z', b'L') => "e",
        c if c == cmd2(b'Z', b'M') => "e",
        c if c == cmd2(b'Z', b'R') => "ev",
        c if c == cmd2(b'Z', b'S') => "e",
        c if c == cmd2(b'Z', b'W') => "e",
        c if c == cmd2(b'Z', b'Z') => "ne",

        // synthetic/version-rewrite forms with no subcommand switch of
        // their own
        c if c == command::COMMAND_TOC => "",
        c if c == command::COMMAND_TOS => "",
        c if c == command::COMMAND_TPC => "e",
        c if c == command::COMMAND_TPS => "e",
        c if c == command::COMMAND_TOP => "",
        c if c == command::COMMAND_TPP => "",
        c if c == command::COMMAND_TAA => "e",
        c if c == command::COMMAND_TAB => "v",
        c if c == command::COMMAND_NEWHH => "ne",
        c if c == command::COMMAND_NEWF => "nee",

        // lowercase keyword table
        c if c == command::COMMAND_INC => "v",
        c if c == command::COMMAND_DEC => "v",
        c if c == command::COMMAND_WAVLOAD => "ee",
        c if c == command::COMMAND_WAVPLAY => "ee",
        c if c == command::COMMAND_WAVSTOP => "e",
        c if c == command::COMMAND_WAVUNLOAD => "e",
        c if c == command::COMMAND_WAVISPLAY => "ev",
        c if c == command::COMMAND_WAVFADE => "eeee",
        c if c == command::COMMAND_WAVISFADE => "ev",
        c if c == command::COMMAND_WAVSTOPFADE => "e",
        c if c == command::COMMAND_TRACE => "z",
        c if c == command::COMMAND_WAV3DSETPOS => "eeee",
        c if c == command::COMMAND_WAV3DCOMMIT => "",
        c if c == command::COMMAND_WAV3DGETPOS => "evvv",
        c if c == command::COMMAND_WAV3DSETPOSL => "eee",
        c if c == command::COMMAND_WAV3DGETPOSL => "vvv",
        c if c == command::COMMAND_WAV3DFADEPOS => "eeeee",
        c if c == command::COMMAND_WAV3DISFADEPOS => "ev",
        c if c == command::COMMAND_WAV3DSTOPFADEPOS => "e",
        c if c == command::COMMAND_WAV3DFADEPOSL => "eeee",
        c if c == command::COMMAND_WAV3DISFADEPOSL => "v",
        c if c == command::COMMAND_WAV3DSTOPFADEPOSL => "",
        c if c == command::COMMAND_SNDPLAY => "ee",
        c if c == command::COMMAND_SNDSTOP => "",
        c if c == command::COMMAND_SNDISPLAY => "v",
        c if c == command::COMMAND_MSG => "z",
        c if c == command::COMMAND_WAVWAITTIME => "ee",
        c if c == command::COMMAND_WAVGETPLAYPOS => "ev",
        c if c == command::COMMAND_WAVWAITEND => "e",
        c if c == command::COMMAND_WAVGETWAVETIME => "ev",
        c if c == command::COMMAND_MENUSETCBKSELECT => "F",
        c if c == command::COMMAND_MENUSETCBKCANCEL => "F",
        c if c == command::COMMAND_MENUCLEARCBKSELECT => "",
        c if c == command::COMMAND_MENUCLEARCBKCANCEL => "",
        c if c == command::COMMAND_WAV3DSETMODE => "ee",
        c if c == command::COMMAND_GRCOPYSTRETCH => "eeeeeeeee",
        c if c == command::COMMAND_GRFILTERRECT => "eeeee",
        c if c == command::COMMAND_IPTCLEARWHEELCOUNT => "",
        c if c == command::COMMAND_IPTGETWHEELCOUNT => "vv",
        c if c == command::COMMAND_MENUGETFONTSIZE => "v",
        c if c == command::COMMAND_MSGGETFONTSIZE => "v",
        c if c == command::COMMAND_STRGETCHARTYPE => "eev",
        c if c == command::COMMAND_STRGETLENGTHASCII => "ev",
        c if c == command::COMMAND_SYSWINMSGLOCK => "",
        c if c == command::COMMAND_SYSWINMSGUNLOCK => "",
        c if c == command::COMMAND_ARYCMPCOUNT => "veev",
        c if c == command::COMMAND_ARYCMPTRANS => "veeeev",
        c if c == command::COMMAND_GRBLENDCOLORRECT => "eeeeeeeee",
        c if c == command::COMMAND_GRDRAWFILLCIRCLE => "eeee",
        c if c == command::COMMAND_MHH => "eee",
        c if c == command::COMMAND_MENUSETCBKINIT => "F",
        c if c == command::COMMAND_MENUCLEARCBKINIT => "",
        c if c == command::COMMAND_SYSOPENSHELL => "z",
        c if c == command::COMMAND_SYSADDWEBMENU => "zz",
        c if c == command::COMMAND_IPTSETMOVECURSORTIME => "e",
        c if c == command::COMMAND_IPTGETMOVECURSORTIME => "v",
        c if c == command::COMMAND_GRBLT => "eeeeee",
        c if c == command::COMMAND_LXWT => "ez",
        c if c == command::COMMAND_LXWS => "ee",
        c if c == command::COMMAND_LXWE => "ee",
        c if c == command::COMMAND_LXWH => "ene",
        c if c == command::COMMAND_LXWHH => "ene",
        c if c == command::COMMAND_SYSGETOSNAME => "e",
        c if c == command::COMMAND_PATCHEC => "e",
        c if c == command::COMMAND_MATHSETCLIPWINDOW => "eeee",
        c if c == command::COMMAND_MATHCLIP => "vvvvvv",
        c if c == command::COMMAND_LXF => "ezz",
        c if c == command::COMMAND_STRINPUTDLG => "zeev",
        c if c == command::COMMAND_STRCHECKASCII => "ev",
        c if c == command::COMMAND_STRCHECKSJIS => "ev",
        c if c == command::COMMAND_STRMESSAGEBOX => "z",
        c if c == command::COMMAND_STRMESSAGEBOXSTR => "e",
        c if c == command::COMMAND_GRCOPYUSEAMAPUSEA => "eeeeeee",
        c if c == command::COMMAND_GRSETCEPARAM => "ee",
        c if c == command::COMMAND_GREFFECTMOVEVIEW => "eeee",
        c if c == command::COMMAND_CGSETCACHESIZE => "e",
        c if c == command::COMMAND_GAIJISET => "ee",
        c if c == command::COMMAND_GAIJICLEARALL => "",
        c if c == command::COMMAND_MENUGETLATESTSELECT => "v",
        c if c == command::COMMAND_LNKISLINK => "eev",
        c if c == command::COMMAND_LNKISDATA => "eev",
        c if c == command::COMMAND_FNCSETTABLE => "eF",
        c if c == command::COMMAND_FNCSETTABLEFROMSTR => "eev",
        c if c == command::COMMAND_FNCCLEARTABLE => "e",
        c if c == command::COMMAND_FNCCALL => "e",
        c if c == command::COMMAND_FNCSETRETURNCODE => "e",
        c if c == command::COMMAND_FNCGETRETURNCODE => "v",
        c if c == command::COMMAND_MSGSETOUTPUTFLAG => "e",
        c if c == command::COMMAND_SAVEDELETEFILE => "ev",
        c if c == command::COMMAND_WAV3DSETUSEFLAG => "e",
        c if c == command::COMMAND_WAVFADEVOLUME => "eeee",
        c if c == command::COMMAND_PATCHEMEN => "e",
        c if c == command::COMMAND_WMENUENABLEMSGSKIP => "e",
        c if c == command::COMMAND_WINGETFLIPFLAG => "v",
        c if c == command::COMMAND_CDGETMAXTRACK => "v",
        c if c == command::COMMAND_DLGERROROKCANCEL => "zv",
        c if c == command::COMMAND_MENUREDUCE => "e",
        c if c == command::COMMAND_MENUGETNUMOF => "v",
        c if c == command::COMMAND_MENUGETTEXT => "ee",
        c if c == command::COMMAND_MENUGOTO => "ee",
        c if c == command::COMMAND_MENURETURNGOTO => "ee",
        c if c == command::COMMAND_MENUFREESHELTERDIB => "",
        c if c == command::COMMAND_MSGFREESHELTERDIB => "",
        c if c == command::COMMAND_DATASETPOINTER => "F",
        c if c == command::COMMAND_DATAGETWORD => "ve",
        c if c == command::COMMAND_DATAGETSTRING => "ee",
        c if c == command::COMMAND_DATASKIPWORD => "e",
        c if c == command::COMMAND_DATASKIPSTRING => "e",
        c if c == command::COMMAND_VARGETNUMOF => "v",
        c if c == command::COMMAND_PATCHG0 => "e",
        c if c == command::COMMAND_REGREADSTRING => "eeev",
        c if c == command::COMMAND_FILECHECKEXIST => "ev",
        c if c == command::COMMAND_TIMECHECKCURDATE => "eeev",
        c if c == command::COMMAND_DLGMANUALPROTECT => "oo",
        c if c == command::COMMAND_FILECHECKDVD => "oeeov",
        c if c == command::COMMAND_SYSRESET => "",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &'static [u8]) -> Vec<u8> {
        let cfg = Config::default();
        let mut c = Compiler::new(cfg, vec!["t.adv".into()], &[("t.adv".into(), String::new())]);
        c.preprocess(src, 0, "t.adv").unwrap();
        c.preprocess_done();
        let full = c.compile(src, 0, "t.adv").unwrap();
        let hdr = sco::header_size("t.adv") as usize;
        full[hdr..].to_vec()
    }

    #[test]
    fn bare_command_a_emits_single_byte() {
        assert_eq!(run(b"A"), vec![0x41]);
    }

    #[test]
    fn command_b_subcommand_1_emits_packed_args() {
        let got = run(b"B1,1,450,20,172,240,1:");
        let expect = vec![
            0x42, 0x01, 0x41, 0x7f, 0x01, 0xc2, 0x7f, 0x54, 0x7f, 0x00, 0xac, 0x7f, 0x00, 0xf0, 0x7f, 0x41,
            0x7f,
        ];
        assert_eq!(got, expect);
    }

    #[test]
    fn assign_to_plain_variable() {
        let cfg = Config::default();
        let mut c = Compiler::new(cfg, vec!["t.adv".into()], &[("t.adv".into(), String::new())]);
        let src: &[u8] = b"!V:0!";
        c.sym.names.insert("V".into(), NameBinding::Variable(0));
        c.variables.push("V".into());
        c.preprocess(src, 0, "t.adv").unwrap();
        c.preprocess_done();
        let full = c.compile(src, 0, "t.adv").unwrap();
        let hdr = sco::header_size("t.adv") as usize;
        assert_eq!(&full[hdr..], &[0x21, 0x80, 0x40, 0x7f]);
    }

    #[test]
    fn label_jump_resolves_forward_reference() {
        let got = run(b"*lbl:@lbl:");
        let hdr = sco::header_size("t.adv");
        let want_addr = hdr; // lbl is declared at the very start of the body
        let mut expect = vec![0x40];
        expect.extend_from_slice(&want_addr.to_le_bytes());
        assert_eq!(got, expect);
    }

    #[test]
    fn for_loop_matches_reference_byte_layout() {
        let got = run(b"<V,1,10,0,3:A>");
        let expect = vec![
            0x21, 0x80, 0x41, 0x7f, 0x3c, 0x00, 0x3c, 0x01, 0x3a, 0x00, 0x00, 0x00, 0x80, 0x7f, 0x4a, 0x7f,
            0x40, 0x7f, 0x43, 0x7f, 0x41, 0x3e, 0x26, 0x00, 0x00, 0x00,
        ];
        assert_eq!(got, expect);
    }

    #[test]
    fn conditional_patches_jump_past_hole() {
        let got = run(b"{0:A}");
        let hdr = sco::header_size("t.adv");
        let jump_target = hdr + 8;
        let mut expect = vec![0x7b, 0x40, 0x7f];
        expect.extend_from_slice(&jump_target.to_le_bytes());
        expect.push(0x41);
        assert_eq!(got, expect);
    }

    #[test]
    fn undefined_label_is_an_error() {
        let cfg = Config::default();
        let mut c = Compiler::new(cfg, vec!["t.adv".into()], &[("t.adv".into(), String::new())]);
        let src: &[u8] = b"@missing:";
        c.preprocess(src, 0, "t.adv").unwrap();
        c.preprocess_done();
        assert!(c.compile(src, 0, "t.adv").is_err());
    }

    #[test]
    fn cross_page_function_call_resolves_after_later_page_defines_it() {
        let cfg = Config::default();
        let sources: Vec<(String, String)> =
            vec![("a.adv".into(), String::new()), ("b.adv".into(), String::new())];
        let mut c = Compiler::new(cfg, vec!["a.adv".into(), "b.adv".into()], &sources);
        let src_a: &[u8] = b"~sub:";
        let src_b: &[u8] = b"**sub:A";

        c.preprocess(src_a, 0, "a.adv").unwrap();
        c.preprocess(src_b, 1, "b.adv").unwrap();
        c.preprocess_done();

        let page_a = c.compile(src_a, 0, "a.adv").unwrap();
        let _page_b = c.compile(src_b, 1, "b.adv").unwrap();

        let hdr = sco::header_size("a.adv") as usize;
        let call_site = hdr + 1; // after the '~' byte
        let page_field = u16::from_le_bytes(page_a[call_site..call_site + 2].try_into().unwrap());
        assert_eq!(page_field, 2); // 1-based page index of b.adv

        let f = c.sym.functions.get("sub").unwrap();
        assert!(f.resolved);
        assert_eq!(f.page, 2);
    }
}
