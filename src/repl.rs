//! Read-eval-print driver
//!
//! Handles the shell's boot modes and the interactive loop on top of an
//! [`Engine`]. Command-line tokens are matched against the known flags
//! exactly; anything else is data for the current mode, never an error.

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use log::debug;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::engine::Engine;

/// Pause after the exit message of the interactive loop
pub const DEFAULT_EXIT_PAUSE: Duration = Duration::from_millis(200);

/// How the shell was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    /// Read scripts from input until it is exhausted
    Interactive,
    /// Run the remaining tokens as one script and exit
    OneLine,
    /// Run each file named by the remaining tokens
    Include,
    /// Print the version and recognized flags
    Usage,
}

/// Recognized flags, in the order usage lists them
pub const FLAGS: [(&str, BootMode); 5] = [
    ("--interactive", BootMode::Interactive),
    ("--oneline", BootMode::OneLine),
    ("--include", BootMode::Include),
    ("--usage", BootMode::Usage),
    ("--help", BootMode::Usage),
];

impl BootMode {
    /// Exact, case-sensitive flag lookup
    pub fn from_flag(token: &str) -> Option<BootMode> {
        FLAGS
            .iter()
            .find(|(flag, _)| *flag == token)
            .map(|(_, mode)| *mode)
    }
}

/// One read from a [`LineReader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A line without its terminator
    Line(String),
    /// The user abandoned the script being entered
    Interrupted,
    /// End of the current input chunk
    End,
}

/// Source of input lines for the interactive loop
///
/// Readers backed by a terminal may produce more lines after an
/// [`Input::End`].
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<Input>;
}

impl LineReader for DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> io::Result<Input> {
        match self.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = self.add_history_entry(line.as_str()) {
                        debug!("history entry not added: {}", e);
                    }
                }
                Ok(Input::Line(line))
            }
            Err(ReadlineError::Eof) => Ok(Input::End),
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e)),
        }
    }
}

/// Line reader over any buffered input; prompts are not echoed
pub struct BufReadLines<R> {
    reader: R,
}

impl<R: BufRead> BufReadLines<R> {
    pub fn new(reader: R) -> Self {
        BufReadLines { reader }
    }
}

impl<R: BufRead> LineReader for BufReadLines<R> {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Input> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(Input::End);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Input::Line(line))
    }
}

/// Shell driver writing to `out`
pub struct ReplDriver<'e, W> {
    engine: &'e mut Engine,
    out: W,
    exit_pause: Duration,
}

impl<'e, W: Write> ReplDriver<'e, W> {
    pub fn new(engine: &'e mut Engine, out: W) -> Self {
        ReplDriver {
            engine,
            out,
            exit_pause: DEFAULT_EXIT_PAUSE,
        }
    }

    pub fn with_exit_pause(mut self, pause: Duration) -> Self {
        self.exit_pause = pause;
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Process command-line tokens and, when the final mode is
    /// interactive, run the interactive loop on `input`
    pub fn start<L: LineReader>(&mut self, args: &[String], input: &mut L) -> io::Result<()> {
        if self.boot(args)? != BootMode::Interactive {
            return Ok(());
        }
        self.interactive(input)
    }

    /// Apply command-line tokens in order; returns the final mode
    ///
    /// Interactive and one-line tokens accumulate into one script that
    /// runs after the last token. Include tokens accumulate into a path
    /// that runs as soon as it names a readable file.
    pub fn boot(&mut self, args: &[String]) -> io::Result<BootMode> {
        let mut mode = BootMode::Interactive;
        let mut source = String::new();
        let mut path = String::new();

        for token in args {
            if let Some(flag) = BootMode::from_flag(token) {
                mode = flag;
                debug!("boot mode {:?}", mode);
                if mode == BootMode::Usage {
                    self.usage()?;
                }
                continue;
            }

            match mode {
                BootMode::Interactive | BootMode::OneLine => {
                    if !source.is_empty() {
                        source.push(' ');
                    }
                    source.push_str(token);
                }
                BootMode::Include => {
                    if !path.is_empty() {
                        path.push(' ');
                    }
                    path.push_str(token);
                    if is_readable_file(&path) {
                        let output = self.engine.run("", &path);
                        writeln!(self.out, "{}", output)?;
                        path.clear();
                    }
                }
                BootMode::Usage => {}
            }
        }

        if !source.is_empty() {
            let output = self.engine.run(&source, "");
            writeln!(self.out, "{}", output)?;
        }
        Ok(mode)
    }

    /// Print the version tag and the recognized flags
    pub fn usage(&mut self) -> io::Result<()> {
        writeln!(self.out, "jseasy ver.{} usage list", Engine::version())?;
        for (flag, _) in FLAGS {
            writeln!(self.out, "{}", flag)?;
        }
        Ok(())
    }

    /// Read scripts until input is exhausted
    ///
    /// Lines accumulate until the end of an input chunk, then run as one
    /// script. An end of input with nothing accumulated ends the loop.
    pub fn interactive<L: LineReader>(&mut self, input: &mut L) -> io::Result<()> {
        writeln!(self.out, "welcome jseasy shell ver.{}", Engine::version())?;
        let mut buffer = String::new();

        loop {
            self.out.flush()?;
            match input.read_line(">")? {
                Input::Line(line) => {
                    if !buffer.is_empty() {
                        buffer.push('\n');
                    }
                    buffer.push_str(&line);
                }
                Input::Interrupted => {
                    debug!("discarding {} bytes of input", buffer.len());
                    buffer.clear();
                }
                Input::End if buffer.trim().is_empty() => break,
                Input::End => {
                    let output = self.engine.run(&buffer, "");
                    writeln!(self.out, "result:")?;
                    writeln!(self.out, "{}", output)?;
                    buffer.clear();
                }
            }
        }

        writeln!(self.out, "exit.")?;
        self.out.flush()?;
        if !self.exit_pause.is_zero() {
            thread::sleep(self.exit_pause);
        }
        Ok(())
    }
}

fn is_readable_file(path: &str) -> bool {
    Path::new(path).is_file() && File::open(path).is_ok()
}
