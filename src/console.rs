//////////////////////////////////////////////////////////////////
/// console.rs
///
/// The console host: stdout-backed syscalls, nested file inclusion,
/// and dictionary image save/load.
///
/// Application syscall numbering (offsets from the user id base):
///   0 include   deferred word: evaluate a source file
///   1 save      deferred word: write the arena image
///   2 load      deferred word: read an arena image back
///   3 .s        print the stack, top first
///   4 bye       leave the interpreter loop
///
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::Stylize;
use crossterm::terminal;

use mforth::{Abort, Addr, Cell, ForthVm, Host, InputState, Syscall};

pub struct ConsoleHost {
    pub exit: bool,
}

impl ConsoleHost {
    pub fn new() -> ConsoleHost {
        ConsoleHost { exit: false }
    }

    /// Evaluate one line, reporting any abort with its source
    /// position. Returns true when the line succeeded.
    pub fn eval_line(&mut self, vm: &mut ForthVm, src: Option<(&str, usize)>, text: &str) -> bool {
        match vm.eval(self, text) {
            Ok(()) => true,
            Err(e) => {
                let msg = match src {
                    Some((name, line)) => format!("{name}:{line}: {e}"),
                    None => e.to_string(),
                };
                eprintln!("{}", msg.red());
                false
            }
        }
    }

    /// Evaluate a source file line by line. A failing line is
    /// reported and the file continues, like the interactive loop.
    pub fn include(&mut self, vm: &mut ForthVm, path: &Path) {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("error opening file '{}': {e}", path.display());
                return;
            }
        };
        let name = path.display().to_string();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let Ok(line) = line else {
                break;
            };
            self.eval_line(vm, Some((&name, n + 1)), &line);
            if self.exit {
                break;
            }
        }
    }

    pub fn load_image(&self, vm: &mut ForthVm, path: &Path) -> io::Result<()> {
        let data = fs::read(path)?;
        let image = vm.dump_mut();
        let n = data.len().min(image.len());
        image[..n].copy_from_slice(&data[..n]);
        Ok(())
    }

    fn save_image(&self, vm: &ForthVm, path: &str) {
        if let Err(e) = fs::write(path, vm.dump()) {
            eprintln!("error saving image '{path}': {e}");
        }
    }

    /// One keystroke, unbuffered when the terminal allows it.
    fn read_key(&self) -> u8 {
        if terminal::enable_raw_mode().is_err() {
            // not a terminal; take one byte from stdin instead
            let mut b = [0u8; 1];
            return match io::stdin().read(&mut b) {
                Ok(1) => b[0],
                _ => 0,
            };
        }
        let key = loop {
            match event::read() {
                Ok(Event::Key(k)) if k.kind == KeyEventKind::Press => match k.code {
                    KeyCode::Char(c) => break c as u8,
                    KeyCode::Enter => break b'\n',
                    KeyCode::Tab => break b'\t',
                    KeyCode::Backspace => break 0x08,
                    KeyCode::Esc => break 0x1b,
                    _ => {}
                },
                Ok(_) => {}
                Err(_) => break 0,
            }
        };
        terminal::disable_raw_mode().ok();
        key
    }
}

/// Cells print without a trailing fraction when they hold an
/// integer: 3, not 3.000000.
fn format_cell(v: Cell) -> String {
    format!("{v}")
}

impl Host for ConsoleHost {
    fn sys(
        &mut self,
        vm: &mut ForthVm,
        id: Cell,
        input: Option<&str>,
    ) -> Result<InputState, Abort> {
        match Syscall::from_cell(id) {
            Some(Syscall::Emit) => {
                let c = vm.pop()? as u32;
                print!("{}", char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER));
                io::stdout().flush().ok();
            }

            Some(Syscall::Print) => {
                let v = vm.pop()?;
                print!("{} ", format_cell(v));
                io::stdout().flush().ok();
            }

            Some(Syscall::Type) => {
                let len = vm.pop()? as Addr;
                let addr = vm.pop()? as Addr;
                let text = vm.kernel.bytes(addr, len)?.to_vec();
                let mut stdout = io::stdout();
                stdout.write_all(&text).ok();
                stdout.flush().ok();
            }

            Some(Syscall::Key) => {
                let c = self.read_key();
                vm.push(c as Cell)?;
            }

            Some(Syscall::User(0)) => {
                let Some(fname) = input else {
                    return Ok(InputState::PassWord);
                };
                self.include(vm, Path::new(fname));
                println!();
            }

            Some(Syscall::User(1)) => {
                let Some(fname) = input else {
                    return Ok(InputState::PassWord);
                };
                self.save_image(vm, fname);
            }

            Some(Syscall::User(2)) => {
                let Some(fname) = input else {
                    return Ok(InputState::PassWord);
                };
                if let Err(e) = self.load_image(vm, Path::new(fname)) {
                    eprintln!("error loading image '{fname}': {e}");
                }
            }

            Some(Syscall::User(3)) => {
                let depth = vm.dstack_count();
                print!("<{depth}>");
                for i in 0..depth {
                    print!(" {}", format_cell(vm.pick(i)?));
                }
                println!();
            }

            Some(Syscall::User(4)) => {
                self.exit = true;
            }

            _ => {
                eprintln!("unhandled syscall {}", format_cell(id));
            }
        }
        Ok(InputState::Interpret)
    }

    fn print(&mut self, text: &str) {
        print!("{text}");
        io::stdout().flush().ok();
    }
}
