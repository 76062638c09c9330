//////////////////////////////////////////////////////////////////
/// dictionary.rs
///
/// Dictionary layout and maintenance.
///
/// A word starts with a variable-width flags cell, a variable-width
/// link cell pointing at the previous word (0 terminates the list),
/// the NUL-terminated name, and then the body. The execution token
/// of a word is the address of its body, the byte just after the
/// name's NUL. All appends are bump allocations at HERE.
///
use crate::host::{Abort, MemSize, Result};
use crate::internals::Prim;
use crate::kernel::{trace_vm, Addr, Cell, Kernel, DICT_SIZE};
use crate::runtime::ForthVm;

// Header flag bits.
pub(crate) const FLAG_IMMEDIATE: u32 = 1 << 6;
pub(crate) const FLAG_PRIM: u32 = 1 << 5;
pub(crate) const FLAG_HIDDEN: u32 = 1 << 4;

impl ForthVm {
    /// Append a cell at HERE with the given size and advance HERE.
    /// Appends must stay inside the dictionary region.
    pub(crate) fn dict_add_cell_typed(&mut self, v: Cell, size: MemSize) -> Result<()> {
        let here = self.kernel.here();
        let width = Kernel::cell_width(v, size);
        if here + width > DICT_SIZE {
            return Err(Abort::OutsideDict);
        }
        self.kernel.put_cell_typed(here, v, size)?;
        self.kernel.set_here(here + width);
        Ok(())
    }

    /// Append a variable-width cell at HERE.
    pub(crate) fn dict_add_cell(&mut self, v: Cell) -> Result<()> {
        self.dict_add_cell_typed(v, MemSize::Var)
    }

    /// Append an opcode or execution token.
    pub(crate) fn dict_add_op(&mut self, op: Addr) -> Result<()> {
        self.dict_add_cell(op as Cell)?;
        trace_vm!(self.kernel, "+{} ", self.op_name(op));
        Ok(())
    }

    /// Append `lit` followed by an inline value.
    pub(crate) fn dict_add_lit(&mut self, v: Cell) -> Result<()> {
        self.dict_add_op(Prim::Lit as Addr)?;
        self.dict_add_cell(v)
    }

    /// Append a NUL-terminated string at HERE.
    pub(crate) fn dict_add_str(&mut self, s: &[u8]) -> Result<()> {
        let here = self.kernel.here();
        if here as usize + s.len() + 1 > DICT_SIZE as usize {
            return Err(Abort::OutsideDict);
        }
        self.kernel.put_bytes(here, s)?;
        let end = here + s.len() as Addr;
        self.kernel.set_byte(end, 0)?;
        self.kernel.set_here(end + 1);
        Ok(())
    }

    /// Create a new word header, adjusting HERE and LATEST.
    pub(crate) fn create(&mut self, name: &[u8], flags: u32) -> Result<()> {
        if self.kernel.here() >= DICT_SIZE {
            return Err(Abort::OutsideDict);
        }
        trace_vm!(self.kernel, "=== create '{}'", String::from_utf8_lossy(name));
        let here_prev = self.kernel.here();
        self.dict_add_cell(flags as Cell)?;
        let latest = self.kernel.latest();
        self.dict_add_cell(latest as Cell)?;
        self.dict_add_str(name)?;
        self.kernel.set_latest(here_prev);
        Ok(())
    }

    /// Walk the LATEST chain comparing names exactly. Returns the
    /// header address and execution token on a hit. Hidden words are
    /// found too; the flag only suppresses them from listings.
    pub(crate) fn find_word(&self, name: &[u8]) -> Result<Option<(Addr, Addr)>> {
        let mut w = self.kernel.latest();
        while w != 0 {
            let mut p = w;
            let (_flags, l) = self.kernel.get_cell(p)?;
            p += l;
            let (link, l) = self.kernel.get_cell(p)?;
            p += l;
            let entry = self.kernel.cstr(p)?;
            if entry == name {
                let xt = p + entry.len() as Addr + 1;
                return Ok(Some((w, xt)));
            }
            w = link as Addr;
        }
        Ok(None)
    }

    fn set_latest_flag(&mut self, bit: u32) -> Result<()> {
        let latest = self.kernel.latest();
        let (flags, _) = self.kernel.get_cell(latest)?;
        self.kernel.put_cell(latest, (flags as u32 | bit) as Cell)?;
        Ok(())
    }

    /// Set the IMMEDIATE flag on the most recently created word.
    pub(crate) fn make_immediate(&mut self) -> Result<()> {
        self.set_latest_flag(FLAG_IMMEDIATE)
    }

    /// Set the HIDDEN flag on the most recently created word.
    pub(crate) fn make_hidden(&mut self) -> Result<()> {
        self.set_latest_flag(FLAG_HIDDEN)
    }

    /// Name of whatever `addr` denotes: a primitive opcode, a header
    /// address, or an execution token. "?" when nothing matches.
    pub(crate) fn op_name(&self, addr: Addr) -> String {
        let mut w = self.kernel.latest();
        while w != 0 {
            let mut p = w;
            let Ok((flags, l)) = self.kernel.get_cell(p) else {
                break;
            };
            p += l;
            let Ok((link, l)) = self.kernel.get_cell(p) else {
                break;
            };
            p += l;
            let Ok(name) = self.kernel.cstr(p) else {
                break;
            };
            let xt = p + name.len() as Addr + 1;
            let Ok((op, _)) = self.kernel.get_cell(xt) else {
                break;
            };
            let is_prim = flags as u32 & FLAG_PRIM != 0;
            if (is_prim && addr == op as Addr) || addr == w || addr == xt {
                return String::from_utf8_lossy(name).into_owned();
            }
            w = link as Addr;
        }
        "?".to_string()
    }
}
