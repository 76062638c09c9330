//////////////////////////////////////////////////////////////////
/// mforth
///
/// A minimal, embeddable Forth virtual machine: a byte-addressed
/// arena holding a threaded-code dictionary and two converging
/// stacks, driven by a character-fed outer interpreter.
///
/// The embedder owns a single `ForthVm` value and supplies a `Host`
/// implementation for I/O, syscalls, and number parsing. `eval`
/// feeds source text through the interpreter and returns either
/// `Ok(())` or the `Abort` reason that unwound execution.
///
pub mod host;
pub mod kernel;
pub mod runtime;

mod internals;

#[cfg(test)]
pub(crate) mod testhost;

pub use host::{Abort, Host, InputState, MemSize, Syscall};
pub use kernel::{Addr, Cell};
pub use runtime::ForthVm;
