//////////////////////////////////////////////////////////////////
/// host.rs
///
/// The contract between the VM core and its embedder: abort codes,
/// the deferred-input protocol states, syscall identifiers, memory
/// size tags, and the Host trait that supplies I/O and number
/// parsing. Host methods receive a mutable reference to the VM so
/// syscalls can touch the stacks, read the arena, or re-enter eval
/// for nested source inclusion.
///
use num_enum::TryFromPrimitive;
use thiserror::Error;

use crate::kernel::Cell;
use crate::runtime::ForthVm;

/// Every way the interpreter can abandon execution. `eval` returns
/// the first abort raised anywhere below it; on the outermost eval
/// the stacks are reset and compile mode is cleared before the code
/// is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Abort {
    #[error("internal error")]
    InternalError,
    #[error("outside memory")]
    OutsideMem,
    #[error("outside dict memory")]
    OutsideDict,
    #[error("dstack underrun")]
    DstackUnderrun,
    #[error("dstack overrun")]
    DstackOverrun,
    #[error("rstack underrun")]
    RstackUnderrun,
    #[error("rstack overrun")]
    RstackOverrun,
    #[error("not a word")]
    NotAWord,
    #[error("compile-only word")]
    CompileOnlyWord,
    #[error("invalid size")]
    InvalidSize,
    #[error("division by zero")]
    DivisionByZero,
    #[error("interrupted")]
    Interrupt,
}

pub type Result<T, E = Abort> = std::result::Result<T, E>;

/// Outer-interpreter input states. A deferred primitive leaves
/// `PassChar` or `PassWord` behind to request more source text; the
/// outer interpreter re-enters the same primitive when it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    #[default]
    Interpret,
    PassChar,
    PassWord,
}

/// Size tags for the typed memory primitives. `Var` selects the
/// variable-width cell encoding; the rest are fixed widths. Any
/// other tag on the stack aborts with `InvalidSize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum MemSize {
    Var = 0,
    Cell,
    U8,
    U16,
    U32,
    S8,
    S16,
    S32,
}

impl MemSize {
    /// Interpret a stack cell as a size tag.
    pub fn from_cell(v: Cell) -> Result<MemSize> {
        if v < 0.0 || v > 255.0 || v.fract() != 0.0 {
            return Err(Abort::InvalidSize);
        }
        MemSize::try_from(v as u8).map_err(|_| Abort::InvalidSize)
    }
}

/// Ids above this value are application-defined.
pub const SYSCALL_USER: u32 = 128;

/// Well-known syscall ids. User ids are carried with their offset
/// from `SYSCALL_USER` so hosts can match on small numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Emit,
    Print,
    Type,
    Key,
    User(u32),
}

impl Syscall {
    pub fn from_cell(id: Cell) -> Option<Syscall> {
        match id as u32 {
            0 => Some(Syscall::Emit),
            1 => Some(Syscall::Print),
            2 => Some(Syscall::Type),
            3 => Some(Syscall::Key),
            n if n >= SYSCALL_USER => Some(Syscall::User(n - SYSCALL_USER)),
            _ => None,
        }
    }
}

/// Services the embedder provides to the VM.
///
/// `sys` implements the syscall primitive: it receives the raw id
/// popped from the stack and, for deferred syscalls, the word the
/// outer interpreter collected. Returning `PassWord` or `PassChar`
/// makes the core re-push the id and re-enter the syscall when the
/// requested input arrives. Aborting from inside a syscall is just
/// returning the error; it unwinds like any core abort.
///
/// `print` is the visible output sink used by `words`, `see` and
/// host-side printing. Trace output does not pass through here; the
/// core emits it on the `log` facade, gated by the `trace` user
/// variable.
pub trait Host {
    fn sys(&mut self, vm: &mut ForthVm, id: Cell, input: Option<&str>) -> Result<InputState>;

    fn print(&mut self, text: &str);

    /// Convert a token that is not in the dictionary to a number.
    fn parse_num(&mut self, token: &str) -> Result<Cell> {
        token.parse().map_err(|_| Abort::NotAWord)
    }
}
