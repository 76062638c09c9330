//////////////////////////////////////////////////////////////////
/// inner.rs
///
/// The inner interpreter.
///
/// Compiled bodies are sequences of variable-width cells. A cell
/// that decodes to a primitive opcode is dispatched directly; any
/// larger value is the execution token of a user word, so the
/// current position is pushed on the return stack and execution
/// threads into that body. A sentinel 0 return address marks the
/// outermost frame; `exit` pops it and the loop ends.
///
use crate::host::{Host, InputState, Result};
use crate::internals::PRIM_COUNT;
use crate::kernel::{trace_vm, Addr, Cell, RSTACK_TOP, UV_RSTACK};
use crate::runtime::ForthVm;

impl ForthVm {
    /// Step the interpreter until `ip` reaches the sentinel. The
    /// optional input is handed to the first primitive only; it is
    /// how deferred primitives receive the word or character they
    /// asked for.
    pub(crate) fn run(&mut self, host: &mut dyn Host, input: Option<&[u8]>) -> Result<()> {
        let mut input = input;
        while self.ip != 0 {
            let ip_org = self.ip;
            let (d, l) = self.kernel.get_cell(self.ip)?;
            let code = d as Addr;
            trace_vm!(
                self.kernel,
                "ip {} code {} depth {}",
                self.ip,
                code,
                self.kernel.rstack_count()
            );
            self.ip += l;

            if code <= PRIM_COUNT {
                self.do_prim(host, code, input)?;

                // The primitive wants more input: rewind so the same
                // opcode fires again when the outer interpreter
                // delivers it.
                if self.input_state != InputState::Interpret {
                    self.ip = ip_org;
                    break;
                }
            } else {
                trace_vm!(self.kernel, "{}/{} ", self.op_name(code), code);
                self.kernel.pushr(self.ip as Cell)?;
                self.ip = code;
            }

            input = None;
        }
        Ok(())
    }

    /// Execute the bytecode at `xt`: clear the return stack, push
    /// the sentinel, and run until it drains.
    pub fn execute(&mut self, host: &mut dyn Host, xt: Addr) -> Result<()> {
        self.ip = xt;
        self.kernel.set_uservar(UV_RSTACK, RSTACK_TOP);
        self.kernel.pushr(0.0)?;
        trace_vm!(self.kernel, "[{}/{}] ", self.op_name(xt), xt);
        self.run(host, None)
    }
}
