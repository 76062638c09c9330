// system configuration and command line processing

use argh::FromArgs;
use std::path::PathBuf;

/// A minimal embeddable Forth interpreter.
#[derive(FromArgs, Debug)]
pub struct Config {
    /// enable execution tracing
    #[argh(switch, short = 't')]
    pub trace: bool,

    /// load a dictionary image instead of bootstrapping
    #[argh(option, short = 'l', arg_name = "FILE")]
    pub load: Option<PathBuf>,

    /// source files to include before the interactive prompt
    #[argh(positional)]
    pub files: Vec<PathBuf>,
}
