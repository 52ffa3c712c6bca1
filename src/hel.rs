//! HEL interface-declaration parser (§4.9): the tiny `void name(type ident,
//! ...);` grammar used to declare a DLL's callable functions and their
//! argument types, grounded on `compiler/hel.c`.
//!
//! A trailing `;` is not actually part of the grammar — it is swallowed by
//! the shared lexer's `;`-starts-a-line-comment rule, the same as in
//! adventure source. `fundecl` itself only ever consumes up to `)`.

use crate::error::Result;
use crate::lexer::Lexer;

const MAX_DLL_FUNC_PARAMS: usize = 20;

/// The fixed 16-entry HEL argument type vocabulary. Most types beyond
/// `pword`/`int`/`IString`/`IConstString` compile to a constant placeholder
/// argument (§4.9) rather than a real expression — they exist so DLL call
/// signatures type-check, not because the compiler passes real values for
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelType {
    Pword = 0,
    Int = 1,
    ISurface = 2,
    IString = 3,
    IWinMsg = 4,
    ITimer = 5,
    IUI = 6,
    ISys3xDIB = 7,
    ISys3xCG = 8,
    ISys3xStringTable = 9,
    ISys3xSystem = 10,
    ISys3xMusic = 11,
    ISys3xMsgString = 12,
    ISys3xInputDevice = 13,
    ISys3x = 14,
    IConstString = 15,
}

const HEL_TYPE_NAMES: &[(&str, HelType)] = &[
    ("pword", HelType::Pword),
    ("int", HelType::Int),
    ("ISurface", HelType::ISurface),
    ("IString", HelType::IString),
    ("IWinMsg", HelType::IWinMsg),
    ("ITimer", HelType::ITimer),
    ("IUI", HelType::IUI),
    ("ISys3xDIB", HelType::ISys3xDIB),
    ("ISys3xCG", HelType::ISys3xCG),
    ("ISys3xStringTable", HelType::ISys3xStringTable),
    ("ISys3xSystem", HelType::ISys3xSystem),
    ("ISys3xMusic", HelType::ISys3xMusic),
    ("ISys3xMsgString", HelType::ISys3xMsgString),
    ("ISys3xInputDevice", HelType::ISys3xInputDevice),
    ("ISys3x", HelType::ISys3x),
    ("IConstString", HelType::IConstString),
];

fn type_from_name(name: &str) -> Option<HelType> {
    HEL_TYPE_NAMES.iter().find(|(n, _)| *n == name).map(|(_, t)| *t)
}

impl HelType {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(v: u32) -> Option<HelType> {
        HEL_TYPE_NAMES.iter().map(|(_, t)| *t).find(|t| t.as_u32() == v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DllFunc {
    pub name: String,
    pub argtypes: Vec<HelType>,
}

fn params(lx: &mut Lexer, func: &mut DllFunc) -> Result<()> {
    if lx.consume_keyword("void")? {
        return Ok(());
    }
    loop {
        if func.argtypes.len() >= MAX_DLL_FUNC_PARAMS {
            return Err(lx.error_at(format!("{}: too many parameters", func.name)));
        }
        let type_name = lx.get_identifier()?;
        let _param_name = lx.get_identifier()?;
        let ty = type_from_name(&type_name)
            .ok_or_else(|| lx.error_at(format!("invalid type '{type_name}'")))?;
        func.argtypes.push(ty);
        if lx.peek()? != b',' {
            break;
        }
        lx.expect(b',')?;
    }
    Ok(())
}

/// `fundecl ::= 'void' identifier '(' params ')'`
fn fundecl(lx: &mut Lexer) -> Result<DllFunc> {
    if !lx.consume_keyword("void")? {
        return Err(lx.error_at("keyword 'void' expected"));
    }
    let name = lx.get_identifier()?;
    let mut func = DllFunc { name, argtypes: Vec::new() };
    lx.expect(b'(')?;
    params(lx, &mut func)?;
    lx.expect(b')')?;
    Ok(func)
}

/// `hel ::= fundecl*`
pub fn parse_hel(source: &[u8], name: &str) -> Result<Vec<DllFunc>> {
    let mut lx = Lexer::new(source, name.to_string(), u32::MAX);
    let mut funcs = Vec::new();
    while lx.peek()? != 0 {
        funcs.push(fundecl(&mut lx)?);
    }
    Ok(funcs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_void_function_with_no_params() {
        let funcs = parse_hel(b"void Init(void);", "t.hel").unwrap();
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "Init");
        assert!(funcs[0].argtypes.is_empty());
    }

    #[test]
    fn parses_multiple_typed_params() {
        let funcs = parse_hel(b"void Foo(int a, pword b, IString c);", "t.hel").unwrap();
        assert_eq!(funcs[0].argtypes, vec![HelType::Int, HelType::Pword, HelType::IString]);
    }

    #[test]
    fn parses_multiple_declarations() {
        let src = b"void A(void);\nvoid B(int x);\n";
        let funcs = parse_hel(src, "t.hel").unwrap();
        assert_eq!(funcs.len(), 2);
        assert_eq!(funcs[1].name, "B");
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(parse_hel(b"void A(bogus x);", "t.hel").is_err());
    }
}
