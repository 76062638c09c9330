//////////////////////////////////////////////////////////////////
/// debug.rs
///
/// Introspection: word listings and the disassembler behind `see`.
///
use crate::host::{Abort, Host, Result};
use crate::internals::{Prim, FLAG_HIDDEN, PRIM_COUNT, PRIM_NAMES};
use crate::kernel::Addr;
use crate::runtime::ForthVm;

impl ForthVm {
    /// Names of the visible (non-hidden) words, newest first. A
    /// non-empty prefix filters; sorting collapses duplicates.
    pub fn words_list(&self, prefix: &str, sorted: bool) -> Result<Vec<String>> {
        let mut words = Vec::new();
        let mut w = self.kernel.latest();
        while w != 0 {
            let mut p = w;
            let (flags, l) = self.kernel.get_cell(p)?;
            p += l;
            let (link, l) = self.kernel.get_cell(p)?;
            p += l;
            if flags as u32 & FLAG_HIDDEN == 0 {
                let name = String::from_utf8_lossy(self.kernel.cstr(p)?).into_owned();
                if prefix.is_empty() || name.starts_with(prefix) {
                    words.push(name);
                }
            }
            w = link as Addr;
        }
        if sorted {
            words.sort();
            words.dedup();
        }
        Ok(words)
    }

    /// Number of visible words, with the same prefix filter.
    pub fn words_count(&self, prefix: &str) -> Result<usize> {
        Ok(self.words_list(prefix, false)?.len())
    }

    /// The `words` primitive: print the visible names.
    pub(crate) fn print_words(&self, host: &mut dyn Host) -> Result<()> {
        for name in self.words_list("", false)? {
            host.print(&name);
            host.print(" ");
        }
        Ok(())
    }

    /// Disassemble the named word.
    pub fn disassemble(&self, host: &mut dyn Host, name: &str) -> Result<()> {
        self.disassemble_bytes(host, name.as_bytes())
    }

    /// One decoded cell per line: primitive names with their inline
    /// payloads, execution tokens resolved back to word names.
    pub(crate) fn disassemble_bytes(&self, host: &mut dyn Host, name: &[u8]) -> Result<()> {
        let Some((_, code)) = self.find_word(name)? else {
            return Err(Abort::NotAWord);
        };
        let mut a = code;
        loop {
            let val = self.kernel.byte(a)?;
            host.print(&format!("{a:8}    "));
            if (val as Addr) < PRIM_COUNT {
                a += 1;
                host.print(&format!("{} ", PRIM_NAMES[val as usize]));
                match Prim::try_from(val) {
                    Ok(Prim::Exit) => break,
                    Ok(Prim::Lit) => {
                        host.print(&format!("\n{a:8}    "));
                        let (v, l) = self.kernel.get_cell(a)?;
                        a += l;
                        host.print(&format!("{v}"));
                    }
                    Ok(Prim::Lits) => {
                        host.print(&format!("\n{a:8}    "));
                        let (n, l) = self.kernel.get_cell(a)?;
                        a += l;
                        host.print(&format!("{n}\n{a:8}    "));
                        for _ in 0..n as Addr {
                            host.print(&format!("{} ", self.kernel.byte(a)?));
                            a += 1;
                        }
                    }
                    _ => {}
                }
            } else {
                let (v, l) = self.kernel.get_cell(a)?;
                a += l;
                host.print(&format!("{} ", self.op_name(v as Addr)));
            }
            host.print("\n");
        }
        Ok(())
    }
}
