//////////////////////////////////////////////////////////////////
/// outer.rs
///
/// The outer interpreter: a character-driven tokeniser feeding the
/// compile-or-execute policy. It knows nothing about what deferred
/// primitives do with their input; it only routes characters and
/// words to them when they ask.
///
use crate::host::{Host, InputState, Result};
use crate::internals::{FLAG_IMMEDIATE, FLAG_PRIM};
use crate::kernel::{Addr, UV_POSTPONE};
use crate::runtime::ForthVm;

// Token buffer capacity; overflow characters are dropped.
const TOKEN_MAX: usize = 31;

impl ForthVm {
    /// Process one character of source. Whitespace and NUL flush the
    /// accumulated token; a quote with an empty buffer is rewritten
    /// to `s"` so conventional string syntax works.
    pub(crate) fn handle_char(&mut self, host: &mut dyn Host, c: u8) -> Result<()> {
        if self.input_state == InputState::PassChar {
            self.input_state = InputState::Interpret;
            return self.run(host, Some(&[c]));
        }
        if c == b'"' && self.token.is_empty() {
            return self.handle_word(host, b"s\"");
        }
        if c != 0 && !c.is_ascii_whitespace() {
            if self.token.len() < TOKEN_MAX {
                self.token.push(c);
            }
            return Ok(());
        }
        if !self.token.is_empty() {
            let token = std::mem::take(&mut self.token);
            return self.handle_word(host, &token);
        }
        Ok(())
    }

    /// Process one completed token: hand it to a waiting deferred
    /// primitive, else look it up and compile or execute it, else
    /// fall back to the host number parser.
    pub(crate) fn handle_word(&mut self, host: &mut dyn Host, buf: &[u8]) -> Result<()> {
        if self.input_state == InputState::PassWord {
            self.input_state = InputState::Interpret;
            return self.run(host, Some(buf));
        }

        if let Some((w, xt)) = self.find_word(buf)? {
            let (flags, _) = self.kernel.get_cell(w)?;
            let flags = flags as u32;

            // immediate words execute even in compile mode, unless
            // the postpone flag forces them into the definition
            if self.kernel.compiling() && (self.kernel.postpone() || flags & FLAG_IMMEDIATE == 0)
            {
                if flags & FLAG_PRIM != 0 {
                    let (op, _) = self.kernel.get_cell(xt)?;
                    self.dict_add_op(op as Addr)?;
                } else {
                    self.dict_add_op(xt)?;
                }
                self.kernel.set_uservar(UV_POSTPONE, 0);
            } else {
                self.execute(host, xt)?;
            }
        } else {
            let v = host.parse_num(&String::from_utf8_lossy(buf))?;
            if self.kernel.compiling() {
                self.dict_add_lit(v)?;
            } else {
                self.kernel.push(v)?;
            }
        }
        Ok(())
    }
}
