//////////////////////////////////////////////////////////////////
/// testhost.rs
///
/// Test support: a host that records everything it is asked to
/// print or emit, with the well-known syscalls plus a `.s`-style
/// stack dump on user id 3.
///
use crate::host::{Host, InputState, Result, Syscall};
use crate::kernel::{Addr, Cell};
use crate::runtime::ForthVm;

pub struct CollectHost {
    pub out: String,
}

impl CollectHost {
    pub fn new() -> CollectHost {
        CollectHost { out: String::new() }
    }
}

impl Host for CollectHost {
    fn sys(&mut self, vm: &mut ForthVm, id: Cell, _input: Option<&str>) -> Result<InputState> {
        match Syscall::from_cell(id) {
            Some(Syscall::Emit) => {
                let c = vm.pop()? as u32;
                self.out.push(char::from_u32(c).unwrap_or('?'));
            }
            Some(Syscall::Print) => {
                let v = vm.pop()?;
                self.out.push_str(&format!("{v} "));
            }
            Some(Syscall::Type) => {
                let len = vm.pop()? as Addr;
                let addr = vm.pop()? as Addr;
                let text = vm.kernel.bytes(addr, len)?.to_vec();
                self.out.push_str(&String::from_utf8_lossy(&text));
            }
            Some(Syscall::User(3)) => {
                let depth = vm.dstack_count();
                self.out.push_str(&format!("<{depth}>"));
                for i in 0..depth {
                    self.out.push_str(&format!(" {}", vm.pick(i)?));
                }
            }
            _ => {}
        }
        Ok(InputState::Interpret)
    }

    fn print(&mut self, text: &str) {
        self.out.push_str(text);
    }
}
