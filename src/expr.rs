//! CALI expression compiler: precedence-climbing recursive descent over the
//! `=,\,<,>,<=,>=,+,-,&,|,^,*,/,%,#const` grammar, emitting postfix bytecode
//! (§4.3).
//!
//! Grammar, loosest to tightest: `equal > compare > bit > add > mul > prim`.
//! Every level falls through to the next when its own operators aren't
//! present, so a bare `prim` is a legal complete expression.

use crate::buffer::{emit_number, emit_var, Buffer};
use crate::config::Config;
use crate::error::Result;
use crate::lexer::Lexer;
use crate::symbol::SymbolTable;

pub const OP_AND: u8 = 0x74;
pub const OP_OR: u8 = 0x75;
pub const OP_XOR: u8 = 0x76;
pub const OP_MUL: u8 = 0x77;
pub const OP_DIV: u8 = 0x78;
pub const OP_ADD: u8 = 0x79;
pub const OP_SUB: u8 = 0x7a;
pub const OP_EQ: u8 = 0x7b;
pub const OP_LT: u8 = 0x7c;
pub const OP_GT: u8 = 0x7d;
pub const OP_NE: u8 = 0x7e;
pub const OP_END: u8 = 0x7f;

/// Secondary operator byte following a `0xc0` escape: modulo, `<=`, `>=`.
pub const OP_C0_MOD: u8 = 0x01;
pub const OP_C0_LE: u8 = 0x02;
pub const OP_C0_GE: u8 = 0x03;

/// Second byte of the `0xc0, 0xc1` array-reference marker (§4.3), distinct
/// from the `0xc0`-secondary-operator bytes above.
pub const OP_C0_INDEX: u8 = 0xc1;

/// `variable` (§4.3): a bare var ref, or `var[expr]` for array indexing.
pub fn variable(b: &mut Buffer, lx: &mut Lexer, cfg: &Config, sym: &SymbolTable) -> Result<()> {
    let name = lx.get_identifier()?;
    let var_id = sym
        .lookup_var(&name)
        .ok_or_else(|| lx.error_at(format!("undefined variable '{name}'")))?;
    if lx.peek()? == b'[' {
        lx.expect(b'[')?;
        b.emit(0xc0);
        b.emit(OP_C0_INDEX);
        emit_var_be(b, var_id);
        expr(b, lx, cfg, sym)?;
        lx.expect(b']')?;
    } else {
        emit_var(b, var_id);
    }
    Ok(())
}

/// Array-index variable refs are written big-endian word, unlike a plain
/// `emit_var` reference, matching the reference's direct `emit_word`.
fn emit_var_be(b: &mut Buffer, var_id: u32) {
    b.emit_word_be(var_id as u16);
}

fn number_literal(b: &mut Buffer, lx: &mut Lexer) -> Result<()> {
    let n = lx.get_number()?;
    emit_number(b, n);
    Ok(())
}

/// `#filename` / `#path`: resolves to the 1-based index of `filename` among
/// the compiler's known source paths (case-insensitive basename match).
fn file_index_literal(b: &mut Buffer, lx: &mut Lexer, src_paths: &[String]) -> Result<()> {
    lx.expect(b'#')?;
    let name = lx.get_filename()?;
    let idx = src_paths
        .iter()
        .position(|p| {
            let base = std::path::Path::new(p)
                .file_name()
                .map(|f| f.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            base == name.to_ascii_lowercase()
        })
        .ok_or_else(|| lx.error_at(format!("unknown source file '{name}'")))?;
    emit_number(b, (idx + 1) as i64);
    Ok(())
}

pub fn expr_prim(
    b: &mut Buffer,
    lx: &mut Lexer,
    cfg: &Config,
    sym: &SymbolTable,
    src_paths: &[String],
) -> Result<()> {
    let c = lx.peek()?;
    if c == b'#' {
        return file_index_literal(b, lx, src_paths);
    }
    if c == b'(' {
        lx.expect(b'(')?;
        expr_equal(b, lx, cfg, sym, src_paths)?;
        lx.expect(b')')?;
        return Ok(());
    }
    if c.is_ascii_digit() {
        return number_literal(b, lx);
    }
    let name = lx.get_identifier()?;
    if name == "__LINE__" {
        emit_number(b, lx.loc().line as i64);
        return Ok(());
    }
    if let Some(v) = sym.lookup_const(&name) {
        emit_number(b, v);
        return Ok(());
    }
    if sym.lookup_var(&name).is_some() {
        // Re-lex the identifier through `variable` so array indexing works.
        return variable_by_name(b, lx, cfg, sym, &name);
    }
    Err(lx.error_at(format!("undefined symbol '{name}'")))
}

fn variable_by_name(
    b: &mut Buffer,
    lx: &mut Lexer,
    cfg: &Config,
    sym: &SymbolTable,
    name: &str,
) -> Result<()> {
    let var_id = sym.lookup_var(name).expect("checked by caller");
    if lx.peek()? == b'[' {
        lx.expect(b'[')?;
        b.emit(0xc0);
        b.emit(OP_C0_INDEX);
        emit_var_be(b, var_id);
        expr_equal(b, lx, cfg, sym, &[])?;
        lx.expect(b']')?;
    } else {
        emit_var(b, var_id);
    }
    Ok(())
}

pub fn expr_mul(
    b: &mut Buffer,
    lx: &mut Lexer,
    cfg: &Config,
    sym: &SymbolTable,
    src_paths: &[String],
) -> Result<()> {
    expr_prim(b, lx, cfg, sym, src_paths)?;
    loop {
        match lx.peek()? {
            b'*' => {
                lx.consume()?;
                expr_prim(b, lx, cfg, sym, src_paths)?;
                b.emit(OP_MUL);
            }
            b'/' => {
                lx.consume()?;
                expr_prim(b, lx, cfg, sym, src_paths)?;
                b.emit(OP_DIV);
            }
            b'%' => {
                lx.consume()?;
                expr_prim(b, lx, cfg, sym, src_paths)?;
                b.emit(0xc0);
                b.emit(OP_C0_MOD);
            }
            _ => return Ok(()),
        }
    }
}

pub fn expr_add(
    b: &mut Buffer,
    lx: &mut Lexer,
    cfg: &Config,
    sym: &SymbolTable,
    src_paths: &[String],
) -> Result<()> {
    expr_mul(b, lx, cfg, sym, src_paths)?;
    loop {
        match lx.peek()? {
            b'+' => {
                lx.consume()?;
                expr_mul(b, lx, cfg, sym, src_paths)?;
                b.emit(OP_ADD);
            }
            b'-' => {
                lx.consume()?;
                expr_mul(b, lx, cfg, sym, src_paths)?;
                b.emit(OP_SUB);
            }
            _ => return Ok(()),
        }
    }
}

pub fn expr_bit(
    b: &mut Buffer,
    lx: &mut Lexer,
    cfg: &Config,
    sym: &SymbolTable,
    src_paths: &[String],
) -> Result<()> {
    expr_add(b, lx, cfg, sym, src_paths)?;
    loop {
        match lx.peek()? {
            b'&' => {
                lx.consume()?;
                expr_add(b, lx, cfg, sym, src_paths)?;
                b.emit(OP_AND);
            }
            b'|' => {
                lx.consume()?;
                expr_add(b, lx, cfg, sym, src_paths)?;
                b.emit(OP_OR);
            }
            b'^' => {
                lx.consume()?;
                expr_add(b, lx, cfg, sym, src_paths)?;
                b.emit(OP_XOR);
            }
            _ => return Ok(()),
        }
    }
}

pub fn expr_compare(
    b: &mut Buffer,
    lx: &mut Lexer,
    cfg: &Config,
    sym: &SymbolTable,
    src_paths: &[String],
) -> Result<()> {
    expr_bit(b, lx, cfg, sym, src_paths)?;
    loop {
        let c = lx.peek()?;
        if c == b'<' && lx.peek_second()? == b'=' {
            lx.consume()?;
            lx.consume()?;
            expr_bit(b, lx, cfg, sym, src_paths)?;
            b.emit(0xc0);
            b.emit(OP_C0_LE);
        } else if c == b'>' && lx.peek_second()? == b'=' {
            lx.consume()?;
            lx.consume()?;
            expr_bit(b, lx, cfg, sym, src_paths)?;
            b.emit(0xc0);
            b.emit(OP_C0_GE);
        } else if c == b'<' {
            lx.consume()?;
            expr_bit(b, lx, cfg, sym, src_paths)?;
            b.emit(OP_LT);
        } else if c == b'>' {
            lx.consume()?;
            expr_bit(b, lx, cfg, sym, src_paths)?;
            b.emit(OP_GT);
        } else {
            return Ok(());
        }
    }
}

/// `=` and `\` (not-equal), plus `$`: present in source for compatibility,
/// consumes its right-hand operand, and emits nothing at all — the
/// reference's own meaning for this operator is unclear, and this crate
/// preserves that behavior exactly rather than inventing a semantics for it
/// (§4.3, §9 Open Question).
pub fn expr_equal(
    b: &mut Buffer,
    lx: &mut Lexer,
    cfg: &Config,
    sym: &SymbolTable,
    src_paths: &[String],
) -> Result<()> {
    expr_compare(b, lx, cfg, sym, src_paths)?;
    loop {
        match lx.peek()? {
            b'=' => {
                lx.consume()?;
                expr_compare(b, lx, cfg, sym, src_paths)?;
                b.emit(OP_EQ);
            }
            b'\\' => {
                lx.consume()?;
                expr_compare(b, lx, cfg, sym, src_paths)?;
                b.emit(OP_NE);
            }
            b'$' => {
                lx.consume()?;
                // Operand compiled into a scratch buffer and discarded: it
                // must still be parsed (for side effects like consuming
                // tokens and validating symbols) but contributes no bytes.
                let mut scratch = Buffer::new();
                expr_compare(&mut scratch, lx, cfg, sym, src_paths)?;
            }
            _ => return Ok(()),
        }
    }
}

/// Top-level entry point: a complete expression terminated by `OP_END`.
pub fn expr(b: &mut Buffer, lx: &mut Lexer, cfg: &Config, sym: &SymbolTable) -> Result<()> {
    expr_equal(b, lx, cfg, sym, &[])?;
    b.emit(OP_END);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::NameBinding;

    fn setup(src: &'static [u8]) -> (Lexer<'static>, Config, SymbolTable) {
        (Lexer::new(src, "t".into(), 0), Config::default(), SymbolTable::new())
    }

    #[test]
    fn literal_small_number_ends_with_op_end() {
        let (mut lx, cfg, sym) = setup(b"5");
        let mut b = Buffer::new();
        expr(&mut b, &mut lx, &cfg, &sym).unwrap();
        assert_eq!(b.as_bytes(), &[0x40 + 5, OP_END]);
    }

    #[test]
    fn addition_emits_postfix_add() {
        let (mut lx, cfg, sym) = setup(b"2+3");
        let mut b = Buffer::new();
        expr(&mut b, &mut lx, &cfg, &sym).unwrap();
        assert_eq!(b.as_bytes(), &[0x42, 0x43, OP_ADD, OP_END]);
    }

    #[test]
    fn mul_binds_tighter_than_add() {
        let (mut lx, cfg, sym) = setup(b"2+3*4");
        let mut b = Buffer::new();
        expr(&mut b, &mut lx, &cfg, &sym).unwrap();
        assert_eq!(b.as_bytes(), &[0x42, 0x43, 0x44, OP_MUL, OP_ADD, OP_END]);
    }

    #[test]
    fn named_constant_substitutes_its_value() {
        let (mut lx, cfg, mut sym) = setup(b"MAX");
        sym.names.insert("MAX".into(), NameBinding::Constant(10));
        let mut b = Buffer::new();
        expr(&mut b, &mut lx, &cfg, &sym).unwrap();
        assert_eq!(b.as_bytes(), &[0x40 + 10, OP_END]);
    }

    #[test]
    fn variable_reference_emits_compact_id() {
        let (mut lx, cfg, mut sym) = setup(b"flag");
        sym.names.insert("flag".into(), NameBinding::Variable(2));
        let mut b = Buffer::new();
        expr(&mut b, &mut lx, &cfg, &sym).unwrap();
        assert_eq!(b.as_bytes(), &[0x80 + 2, OP_END]);
    }
}
