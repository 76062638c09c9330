//////////////////////////////////////////////////////////////////
/// primitives.rs
///
/// The primitive opcode set. The enum order fixes the opcodes that
/// end up in compiled bodies, so it must match PRIM_NAMES and never
/// be reordered once images exist.
///
/// Dispatch is a single match in `do_prim`. Each primitive is
/// defined by its effect on the data stack; `( a b -- c )` means two
/// popped, one pushed. Deferred primitives receive `input` on their
/// second entry: the word or character the outer interpreter
/// collected on their behalf.
///
use num_enum::TryFromPrimitive;

use crate::host::{Abort, Host, InputState, MemSize, Result};
use crate::kernel::{
    trace_vm, Addr, Cell, CELL_BYTES, DICT_SIZE, PAD_BASE, PAD_SIZE, USERVAR_COUNT,
};
use crate::runtime::ForthVm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub(crate) enum Prim {
    Exit = 0,
    Abort,
    Create,
    Forget,
    Lit,
    Lits,
    Ltz,
    Colon,
    Semicolon,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Drop,
    Dup,
    TwoDup,
    PickR,
    Immediate,
    Hidden,
    Peek,
    Poke,
    Swap,
    TwoSwap,
    TwoOver,
    Tuck,
    TwoTuck,
    Rot,
    Jmp,
    Jmp0,
    Tick,
    TickCompile,
    Comment,
    LineComment,
    PushR,
    PopR,
    Equal,
    Sys,
    Pick,
    Comma,
    Word,
    Len,
    And,
    StrLit,
    Execute,
    CMove,
    Char,
    Words,
    See,
    Cells,
    Alloc,
    Compare,
    Search,
    Atoi,
    Atof,
}

/// Bootstrap names, in opcode order. A leading underscore marks the
/// word immediate and is stripped before it enters the dictionary.
pub(crate) const PRIM_NAMES: [&str; 55] = [
    "exit", "abort", "create", "forget", "lit", "lits", "<0", ":", "_;", "+", "-", "*", "/",
    "mod", "drop", "dup", "2dup", "pickr", "_immediate", "_hidden", "@@", "!!", "swap", "2swap",
    "2over", "tuck", "2tuck", "rot", "jmp", "jmp0", "'", "[']", "_(", "_\\", ">r", "r>", "=",
    "sys", "pick", ",,", "word", "##", "&", "_s\"", "execute", "cmove", "char", "words", "see",
    "cells", "alloc", "compare", "search", "atoi", "atof",
];

pub(crate) const PRIM_COUNT: Addr = PRIM_NAMES.len() as Addr;

fn flag(b: bool) -> Cell {
    if b {
        1.0
    } else {
        0.0
    }
}

impl ForthVm {
    /// Fetch through an address, redirecting indices below the
    /// user-variable count into the vector. The size tag is only
    /// honoured (and validated) for real arena addresses.
    fn peek(&self, addr: Addr, size: Cell) -> Result<(Cell, Addr)> {
        if addr < USERVAR_COUNT {
            Ok((self.kernel.uservar(addr) as Cell, 1))
        } else {
            self.kernel.get_cell_typed(addr, MemSize::from_cell(size)?)
        }
    }

    /// Append one byte to the scratch pad, aborting when the pad
    /// region is exhausted.
    fn pad_put_byte(&mut self, b: u8) -> Result<()> {
        let pad = self.kernel.pad();
        if pad >= PAD_BASE + PAD_SIZE {
            return Err(Abort::OutsideMem);
        }
        self.kernel.set_byte(pad, b)?;
        self.kernel.set_pad(pad + 1);
        Ok(())
    }

    /// Run one primitive. `input` is None on first entry; deferred
    /// primitives set an input state and are re-entered with the
    /// requested text.
    pub(crate) fn do_prim(
        &mut self,
        host: &mut dyn Host,
        code: Addr,
        input: Option<&[u8]>,
    ) -> Result<()> {
        let op = Prim::try_from(code as u8).map_err(|_| Abort::InternalError)?;
        trace_vm!(self.kernel, "({}) ", PRIM_NAMES[op as usize]);

        match op {
            Prim::Exit => {
                self.ip = self.kernel.popr()? as Addr;
            }

            Prim::Abort => return Err(Abort::InternalError),

            // create <name> ( -- ) header whose body pushes the
            // data-field address and returns
            Prim::Create => {
                let Some(input) = input else {
                    self.input_state = InputState::PassWord;
                    return Ok(());
                };
                self.create(input, 0)?;
                let base = self.kernel.here();
                // the literal's own encoded width shifts the data field
                let body = if base + 3 < 128 {
                    base + 3
                } else if base + 4 < 16384 {
                    base + 4
                } else {
                    base + 2 + CELL_BYTES + 1
                };
                self.dict_add_lit(body as Cell)?;
                self.dict_add_op(Prim::Exit as Addr)?;
            }

            // forget <name> ( -- ) rewind HERE and LATEST past the word
            Prim::Forget => {
                let Some(input) = input else {
                    self.input_state = InputState::PassWord;
                    return Ok(());
                };
                let Some((w, _)) = self.find_word(input)? else {
                    return Err(Abort::NotAWord);
                };
                self.kernel.set_here(w);
                let (_, l) = self.kernel.get_cell(w)?;
                let (link, _) = self.kernel.get_cell(w + l)?;
                self.kernel.set_latest(link as Addr);
            }

            // lit ( -- v ) push the inline value
            Prim::Lit => {
                let (v, l) = self.kernel.get_cell(self.ip)?;
                self.ip += l;
                self.kernel.push(v)?;
            }

            // lits ( -- a ) push the inline string address, skip it
            Prim::Lits => {
                let (n, l) = self.kernel.get_cell(self.ip)?;
                self.ip += l;
                self.kernel.push(self.ip as Cell)?;
                self.ip += n as Addr;
            }

            // <0 ( v -- f )
            Prim::Ltz => {
                let v = self.kernel.pop()?;
                self.kernel.push(flag(v < 0.0))?;
            }

            // : <name> ( -- ) open a definition
            Prim::Colon => {
                let Some(input) = input else {
                    self.input_state = InputState::PassWord;
                    return Ok(());
                };
                self.create(input, 0)?;
                self.kernel.set_compiling(true);
            }

            // ; ( -- ) close the definition (immediate)
            Prim::Semicolon => {
                self.dict_add_op(Prim::Exit as Addr)?;
                trace_vm!(self.kernel, "===");
                self.kernel.set_compiling(false);
            }

            Prim::Add => {
                let d1 = self.kernel.pop()?;
                let d2 = self.kernel.pop()?;
                self.kernel.push(d1 + d2)?;
            }

            Prim::Sub => {
                let d1 = self.kernel.pop()?;
                let d2 = self.kernel.pop()?;
                self.kernel.push(d2 - d1)?;
            }

            Prim::Mul => {
                let d1 = self.kernel.pop()?;
                let d2 = self.kernel.pop()?;
                self.kernel.push(d1 * d2)?;
            }

            Prim::Div => {
                let d2 = self.kernel.pop()?;
                if d2 == 0.0 {
                    return Err(Abort::DivisionByZero);
                }
                let d1 = self.kernel.pop()?;
                self.kernel.push(d1 / d2)?;
            }

            // mod operates on the integer part of both operands
            Prim::Mod => {
                let d2 = self.kernel.pop()?;
                if d2 as i64 == 0 {
                    return Err(Abort::DivisionByZero);
                }
                let d1 = self.kernel.pop()?;
                self.kernel.push((d1 as i64 % d2 as i64) as Cell)?;
            }

            Prim::Drop => {
                self.kernel.pop()?;
            }

            Prim::Dup => {
                let d = self.kernel.pop()?;
                self.kernel.push(d)?;
                self.kernel.push(d)?;
            }

            Prim::TwoDup => {
                let d2 = self.kernel.pop()?;
                let d1 = self.kernel.pop()?;
                for v in [d1, d2, d1, d2] {
                    self.kernel.push(v)?;
                }
            }

            Prim::PickR => {
                let n = self.kernel.pop()? as Addr;
                let v = self.kernel.pickr(n)?;
                self.kernel.push(v)?;
            }

            Prim::Immediate => self.make_immediate()?,

            Prim::Hidden => self.make_hidden()?,

            // @@ ( a size -- v )
            Prim::Peek => {
                let size = self.kernel.pop()?;
                let addr = self.kernel.pop()? as Addr;
                let (v, _) = self.peek(addr, size)?;
                self.kernel.push(v)?;
            }

            // !! ( v a size -- )
            Prim::Poke => {
                let size = self.kernel.pop()?;
                let addr = self.kernel.pop()? as Addr;
                let v = self.kernel.pop()?;
                if addr < USERVAR_COUNT {
                    self.kernel.set_uservar(addr, v as Addr);
                } else {
                    self.kernel
                        .put_cell_typed(addr, v, MemSize::from_cell(size)?)?;
                }
            }

            Prim::Swap => {
                let d1 = self.kernel.pop()?;
                let d2 = self.kernel.pop()?;
                self.kernel.push(d1)?;
                self.kernel.push(d2)?;
            }

            Prim::TwoSwap => {
                let d1 = self.kernel.pop()?;
                let d2 = self.kernel.pop()?;
                let d3 = self.kernel.pop()?;
                let d4 = self.kernel.pop()?;
                for v in [d2, d1, d4, d3] {
                    self.kernel.push(v)?;
                }
            }

            Prim::TwoOver => {
                let d4 = self.kernel.pop()?;
                let d3 = self.kernel.pop()?;
                let d2 = self.kernel.pop()?;
                let d1 = self.kernel.pop()?;
                for v in [d1, d2, d3, d4, d1, d2] {
                    self.kernel.push(v)?;
                }
            }

            Prim::Tuck => {
                let d1 = self.kernel.pop()?;
                let d2 = self.kernel.pop()?;
                for v in [d1, d2, d1] {
                    self.kernel.push(v)?;
                }
            }

            Prim::TwoTuck => {
                let d4 = self.kernel.pop()?;
                let d3 = self.kernel.pop()?;
                let d2 = self.kernel.pop()?;
                let d1 = self.kernel.pop()?;
                for v in [d3, d4, d1, d2, d3, d4] {
                    self.kernel.push(v)?;
                }
            }

            Prim::Rot => {
                let d1 = self.kernel.pop()?;
                let d2 = self.kernel.pop()?;
                let d3 = self.kernel.pop()?;
                for v in [d2, d1, d3] {
                    self.kernel.push(v)?;
                }
            }

            // jmp ( -- ) unconditional branch to the inline address
            Prim::Jmp => {
                let (t, l) = self.kernel.get_cell(self.ip)?;
                self.ip += l;
                trace_vm!(self.kernel, "ip {}=>{}", self.ip, t);
                self.ip = t as Addr;
            }

            // jmp0 ( f -- ) branch when the popped flag is zero
            Prim::Jmp0 => {
                let (t, l) = self.kernel.get_cell(self.ip)?;
                self.ip += l;
                if self.kernel.pop()? == 0.0 {
                    trace_vm!(self.kernel, "ip {}=>{}", self.ip, t);
                    self.ip = t as Addr;
                }
            }

            // ' <name> ( -- xt )
            Prim::Tick => {
                let Some(input) = input else {
                    self.input_state = InputState::PassWord;
                    return Ok(());
                };
                let Some((_, xt)) = self.find_word(input)? else {
                    return Err(Abort::NotAWord);
                };
                self.kernel.push(xt as Cell)?;
            }

            // ['] ( -- xt ) push the inline cell, skipping it
            Prim::TickCompile => {
                let (v, l) = self.kernel.get_cell(self.ip)?;
                self.ip += l;
                trace_vm!(self.kernel, "{}/", self.op_name(v as Addr));
                self.kernel.push(v)?;
            }

            // ( ... ) block comment: eat characters to the close paren
            Prim::Comment => {
                if input.map_or(true, |i| i.first() != Some(&b')')) {
                    self.input_state = InputState::PassChar;
                }
            }

            // \ line comment: eat characters to end of line
            Prim::LineComment => {
                if input.map_or(true, |i| i.first() != Some(&b'\n')) {
                    self.input_state = InputState::PassChar;
                }
            }

            Prim::PushR => {
                let v = self.kernel.pop()?;
                self.kernel.pushr(v)?;
            }

            Prim::PopR => {
                let v = self.kernel.popr()?;
                self.kernel.push(v)?;
            }

            Prim::Equal => {
                let d1 = self.kernel.pop()?;
                let d2 = self.kernel.pop()?;
                self.kernel.push(flag(d1 == d2))?;
            }

            // sys ( id -- ? ) delegate to the host; a deferred host
            // answer re-pushes the id so the syscall resumes
            Prim::Sys => {
                let id = self.kernel.pop()?;
                let text = input.map(String::from_utf8_lossy);
                let state = host.sys(self, id, text.as_deref())?;
                self.input_state = state;
                if state != InputState::Interpret {
                    self.kernel.push(id)?;
                }
            }

            // pick ( n -- v )
            Prim::Pick => {
                let n = self.kernel.pop()? as Addr;
                let v = self.kernel.pick(n)?;
                self.kernel.push(v)?;
            }

            // ,, ( v size -- ) append at HERE with the given size
            Prim::Comma => {
                let size = self.kernel.pop()?;
                let v = self.kernel.pop()?;
                self.dict_add_cell_typed(v, MemSize::from_cell(size)?)?;
            }

            // word ( delim -- a ) collect characters into the pad
            // until the delimiter, newline, or NUL
            Prim::Word => {
                let Some(input) = input else {
                    let pad = self.kernel.pad();
                    self.kernel.push(pad as Cell)?;
                    self.input_state = InputState::PassChar;
                    return Ok(());
                };
                let delim = self.kernel.pick(1)? as u8;
                let c = input.first().copied().unwrap_or(0);
                if c == delim || c == b'\n' || c == 0 {
                    self.pad_put_byte(0)?;
                    let addr = self.kernel.pop()?;
                    self.kernel.pop()?;
                    self.kernel.push(addr)?;
                } else {
                    self.pad_put_byte(c)?;
                    self.input_state = InputState::PassChar;
                }
            }

            // ## ( a size -- n ) bytes a fetch would consume
            Prim::Len => {
                let size = self.kernel.pop()?;
                let addr = self.kernel.pop()? as Addr;
                let (_, l) = self.peek(addr, size)?;
                self.kernel.push(l as Cell)?;
            }

            Prim::And => {
                let d1 = self.kernel.pop()?;
                let d2 = self.kernel.pop()?;
                self.kernel.push((d1 as i64 & d2 as i64) as Cell)?;
            }

            Prim::StrLit => self.do_str_lit(input)?,

            // execute ( xt -- ) run the word; note this restarts the
            // return stack, so it does not return to the caller
            Prim::Execute => {
                let addr = self.kernel.pop()? as Addr;
                self.execute(host, addr)?;
            }

            // cmove ( src dst len -- )
            Prim::CMove => {
                let len = self.kernel.pop()? as Addr;
                let dst = self.kernel.pop()? as Addr;
                let src = self.kernel.pop()? as Addr;
                self.kernel.copy_within(src, dst, len)?;
            }

            // char <name> ( -- c ) first byte of the next word
            Prim::Char => {
                let Some(input) = input else {
                    self.input_state = InputState::PassWord;
                    return Ok(());
                };
                let c = input.first().copied().unwrap_or(0);
                self.kernel.push(c as Cell)?;
            }

            Prim::Words => self.print_words(host)?,

            // see <name> ( -- ) disassemble a word
            Prim::See => {
                let Some(input) = input else {
                    self.input_state = InputState::PassWord;
                    return Ok(());
                };
                self.disassemble_bytes(host, input)?;
            }

            // cells ( n -- n' ) scale by the worst-case cell stride
            Prim::Cells => {
                let n = self.kernel.pop()?;
                self.kernel.push(n * (CELL_BYTES + 1) as Cell)?;
            }

            // alloc ( n -- a ) reserve pad space, wrapping when full
            Prim::Alloc => {
                let n = self.kernel.pop()?;
                let n = if n < 0.0 { 0 } else { n as u64 };
                let mut pad = self.kernel.pad() as u64;
                let end = (PAD_BASE + PAD_SIZE) as u64;
                if pad + n + 1 >= end {
                    pad = PAD_BASE as u64;
                }
                if pad + n + 1 > end {
                    return Err(Abort::OutsideMem);
                }
                self.kernel.push(pad as Cell)?;
                self.kernel.set_pad((pad + n + 1) as Addr);
            }

            // compare ( a2 l2 a1 l1 -- n ) lexicographic order
            Prim::Compare => {
                let len1 = self.kernel.pop()? as Addr;
                let addr1 = self.kernel.pop()? as Addr;
                let len2 = self.kernel.pop()? as Addr;
                let addr2 = self.kernel.pop()? as Addr;
                if len1 != len2 {
                    self.kernel.push(len1 as Cell - len2 as Cell)?;
                } else {
                    let order = {
                        let s1 = self.kernel.bytes(addr1, len1)?;
                        let s2 = self.kernel.bytes(addr2, len2)?;
                        s1.cmp(s2)
                    };
                    self.kernel.push(match order {
                        std::cmp::Ordering::Less => -1.0,
                        std::cmp::Ordering::Equal => 0.0,
                        std::cmp::Ordering::Greater => 1.0,
                    })?;
                }
            }

            // search ( hay l2 needle l1 -- pos ) 1-based, 0 = missing
            Prim::Search => {
                let len1 = self.kernel.pop()? as Addr;
                let addr1 = self.kernel.pop()? as Addr;
                let len2 = self.kernel.pop()? as Addr;
                let addr2 = self.kernel.pop()? as Addr;
                if len1 > len2 {
                    self.kernel.push(0.0)?;
                } else {
                    let pos = {
                        let needle = self.kernel.bytes(addr1, len1)?;
                        let hay = self.kernel.bytes(addr2, len2)?;
                        let mut pos = 0u64;
                        for i in 0..=(len2 - len1) as usize {
                            if &hay[i..i + len1 as usize] == needle {
                                pos = i as u64 + 1;
                                break;
                            }
                        }
                        pos
                    };
                    self.kernel.push(pos as Cell)?;
                }
            }

            // atoi ( a len -- n ) leading integer of the region
            Prim::Atoi => {
                let len = self.kernel.pop()? as Addr;
                let addr = self.kernel.pop()? as Addr;
                let text = self.text_at(addr, len)?;
                self.kernel.push(parse_int_prefix(&text) as Cell)?;
            }

            // atof ( a len -- v ) leading float of the region
            Prim::Atof => {
                let len = self.kernel.pop()? as Addr;
                let addr = self.kernel.pop()? as Addr;
                let text = self.text_at(addr, len)?;
                self.kernel.push(parse_float_prefix(&text))?;
            }
        }
        Ok(())
    }

    /// s" : in compile mode emit `lits` plus the inline bytes; in
    /// interpret mode stage the bytes in the pad. Terminated by an
    /// unescaped quote; the close leaves ( a len ) behind, or
    /// compiles `lit len` after the inline string.
    fn do_str_lit(&mut self, input: Option<&[u8]>) -> Result<()> {
        let Some(input) = input else {
            if self.kernel.compiling() {
                self.dict_add_op(Prim::Lits as Addr)?;
                self.dict_add_cell(0.0)?;
                let here = self.kernel.here();
                self.kernel.push(here as Cell)?;
            } else {
                let pad = self.kernel.pad();
                self.kernel.push(pad as Cell)?;
            }
            self.input_state = InputState::PassChar;
            return Ok(());
        };

        let c = input.first().copied().unwrap_or(0);
        let compiling = self.kernel.compiling();

        if compiling && c == b'"' && self.kernel.byte(self.kernel.here() - 1)? != b'\\' {
            let here = self.kernel.here();
            let addr = self.kernel.pop()? as Addr;
            let len = here - addr;
            // patch the length placeholder in front of the bytes
            self.kernel.put_cell(here - len - 1, len as Cell)?;
            self.dict_add_lit(len as Cell)?;
            return Ok(());
        }

        if !compiling && c == b'"' && self.kernel.byte(self.kernel.pad() - 1)? != b'\\' {
            let addr = self.kernel.pick(0)? as Addr;
            let len = self.kernel.pad() - addr;
            self.kernel.push(len as Cell)?;
            return Ok(());
        }

        if compiling {
            let here = self.kernel.here();
            if here >= DICT_SIZE {
                return Err(Abort::OutsideDict);
            }
            self.kernel.set_byte(here, c)?;
            self.kernel.set_here(here + 1);
        } else {
            let pad = self.kernel.pad();
            if pad >= PAD_BASE + PAD_SIZE - 2 {
                // wrap: move the staged run back to the pad base
                let addr = self.kernel.pop()? as Addr;
                let len = pad - addr;
                self.kernel.push(PAD_BASE as Cell)?;
                self.kernel.copy_within(addr, PAD_BASE, len)?;
                self.kernel.set_pad(PAD_BASE + len);
            }
            self.pad_put_byte(c)?;
        }
        self.input_state = InputState::PassChar;
        Ok(())
    }

    /// Bytes of the addressed region: `len` of them, or up to the
    /// first NUL when `len` is zero, capped at 31 either way.
    fn text_at(&self, addr: Addr, len: Addr) -> Result<Vec<u8>> {
        let mut bytes = if len == 0 {
            self.kernel.cstr(addr)?.to_vec()
        } else {
            self.kernel.bytes(addr, len)?.to_vec()
        };
        bytes.truncate(31);
        Ok(bytes)
    }
}

/// atol-style conversion: optional whitespace and sign, then the
/// leading digit run; 0 when there are no digits.
fn parse_int_prefix(s: &[u8]) -> i64 {
    let mut i = 0;
    while i < s.len() && s[i].is_ascii_whitespace() {
        i += 1;
    }
    let mut sign = 1i64;
    if i < s.len() && (s[i] == b'+' || s[i] == b'-') {
        if s[i] == b'-' {
            sign = -1;
        }
        i += 1;
    }
    let mut v = 0i64;
    while i < s.len() && s[i].is_ascii_digit() {
        v = v.saturating_mul(10).saturating_add((s[i] - b'0') as i64);
        i += 1;
    }
    sign * v
}

/// strtod-style conversion: the longest prefix that parses as a
/// float; 0.0 when none does.
fn parse_float_prefix(s: &[u8]) -> f64 {
    let text = String::from_utf8_lossy(s);
    let text = text.trim_start();
    for i in (1..=text.len()).rev() {
        if !text.is_char_boundary(i) {
            continue;
        }
        if let Ok(v) = text[..i].parse::<f64>() {
            return v;
        }
    }
    0.0
}
