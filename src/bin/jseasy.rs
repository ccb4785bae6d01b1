//! jseasy shell
//!
//! Runs the default bindings in one engine. See `--usage` for the modes.

use std::io;

use jseasy::{bindings, Engine, EngineConfig, ReplDriver};
use rustyline::DefaultEditor;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut engine = match Engine::new(EngineConfig::from_env()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    bindings::install(&mut engine);

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error opening terminal: {}", e);
            std::process::exit(1);
        }
    };

    let mut driver = ReplDriver::new(&mut engine, io::stdout());
    if let Err(e) = driver.start(&args, &mut editor) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
