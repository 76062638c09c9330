//////////////////////////////////////////////////////////////////
/// runtime.rs
///
/// The Forth VM.
///
/// This module defines the ForthVm struct, which owns the memory
/// kernel and the interpreter state: the instruction pointer, the
/// outer interpreter's input state and token buffer, and the eval
/// re-entrance depth. It provides the embedder-facing entry points:
/// cold start, bootstrap, eval, the stack utilities, and the arena
/// dump used for image save and load.
///
use crate::host::{Host, InputState, Result};
use crate::internals::{Prim, FLAG_PRIM, PRIM_NAMES};
use crate::kernel::{
    Addr, Cell, Kernel, DICT_SIZE, DSTACK_BASE, USERVAR_COUNT, UV_DSTACK, UV_RSTACK, UV_TRACE,
};

/// Words created for the user variables, in index order. Reading or
/// writing these indices through the memory primitives is redirected
/// into the user-variable vector, so each word only has to push its
/// index.
const USERVAR_NAMES: [&str; USERVAR_COUNT as usize] = [
    "h",
    "latest",
    "trace",
    "compiling",
    "_postpone",
    "dstack",
    "rstack",
    "pad",
];

/// The VM: one value holds everything, so embedders can run several
/// independent interpreters or drop one wholesale.
pub struct ForthVm {
    pub kernel: Kernel,
    pub(crate) ip: Addr,
    pub(crate) input_state: InputState,
    pub(crate) token: Vec<u8>,
    eval_depth: u32,
}

impl ForthVm {
    /// Cold start: a zeroed arena with the user variables at their
    /// initial values. The dictionary is empty until `bootstrap` or
    /// an image load.
    pub fn new(trace: bool) -> ForthVm {
        let mut vm = ForthVm {
            kernel: Kernel::new(),
            ip: 0,
            input_state: InputState::Interpret,
            token: Vec::new(),
            eval_depth: 0,
        };
        vm.kernel.set_uservar(UV_TRACE, trace as Addr);
        vm
    }

    /// Seed the dictionary: every primitive in opcode order, then a
    /// word per user variable.
    pub fn bootstrap(&mut self) -> Result<()> {
        for (op, name) in PRIM_NAMES.iter().enumerate() {
            self.add_prim(name, op as Addr)?;
        }
        for (i, name) in USERVAR_NAMES.iter().enumerate() {
            self.add_uservar(name, i as Addr)?;
        }
        Ok(())
    }

    /// A primitive's dictionary entry is its opcode followed by
    /// exit. A leading underscore marks the word immediate; a few
    /// names are hidden so listings stay clean while the words stay
    /// usable.
    fn add_prim(&mut self, name: &str, op: Addr) -> Result<()> {
        let (name, immediate) = match name.strip_prefix('_') {
            Some(stripped) => (stripped, true),
            None => (name, false),
        };
        self.create(name.as_bytes(), FLAG_PRIM)?;
        self.dict_add_op(op)?;
        self.dict_add_op(Prim::Exit as Addr)?;
        if immediate {
            self.make_immediate()?;
        }
        if matches!(name, ",," | "@@" | "!!" | "##" | "(" | "\\") {
            self.make_hidden()?;
        }
        Ok(())
    }

    fn add_uservar(&mut self, name: &str, idx: Addr) -> Result<()> {
        self.create(name.as_bytes(), 0)?;
        self.dict_add_lit(idx as Cell)?;
        self.dict_add_op(Prim::Exit as Addr)
    }

    /// Feed source text through the interpreter. Nested calls are
    /// allowed (a host syscall may re-enter for file inclusion);
    /// only the outermost call acts as the abort landing pad,
    /// resetting compile mode, both stacks, and the input protocol
    /// before handing the reason back. The dictionary is never
    /// rewound: a partial definition stays until `forget`.
    pub fn eval(&mut self, host: &mut dyn Host, src: &str) -> Result<()> {
        self.eval_depth += 1;
        let r = self.eval_chars(host, src);
        self.eval_depth -= 1;
        if r.is_err() && self.eval_depth == 0 {
            self.kernel.set_compiling(false);
            self.kernel.reset_stacks();
            self.input_state = InputState::Interpret;
            self.ip = 0;
            self.token.clear();
        }
        r
    }

    fn eval_chars(&mut self, host: &mut dyn Host, src: &str) -> Result<()> {
        for b in src.bytes() {
            self.handle_char(host, b)?;
        }
        // the trailing NUL flushes the final token and terminates
        // any pending word collection
        self.handle_char(host, 0)
    }

    ///////////////////////////////////////////
    // Stack utilities for embedders and hosts

    pub fn push(&mut self, v: Cell) -> Result<()> {
        self.kernel.push(v)
    }

    pub fn pop(&mut self) -> Result<Cell> {
        self.kernel.pop()
    }

    pub fn pick(&self, n: Addr) -> Result<Cell> {
        self.kernel.pick(n)
    }

    pub fn dstack_count(&self) -> Addr {
        self.kernel.dstack_count()
    }

    pub fn rstack_count(&self) -> Addr {
        self.kernel.rstack_count()
    }

    ///////////////////////////////////////////
    // Image and memory queries

    /// The flat arena image. The leading user-variable vector makes
    /// a saved image self-describing: loading it re-establishes
    /// HERE, LATEST, PAD and the stack pointers. Images only port
    /// across builds with matching cell width, address width, and
    /// endianness.
    pub fn dump(&self) -> &[u8] {
        self.kernel.mem()
    }

    pub fn dump_mut(&mut self) -> &mut [u8] {
        self.kernel.mem_mut()
    }

    /// Unused bytes across the dictionary, the pad, and the gap
    /// between the stacks.
    pub fn free_mem(&self) -> Addr {
        DICT_SIZE.saturating_sub(self.kernel.here())
            + DSTACK_BASE.saturating_sub(self.kernel.pad())
            + self
                .kernel
                .uservar(UV_RSTACK)
                .saturating_sub(self.kernel.uservar(UV_DSTACK))
    }
}
