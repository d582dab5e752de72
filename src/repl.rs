use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{config::HostConfig, diagnostics::Result, state::State};

/// Line-at-a-time front end over a single long-lived [`State`].
///
/// Each line is its own unit; bindings persist between lines, and a failed
/// line leaves the state usable for the next one.
pub struct Repl {
    state: State,
}

impl Repl {
    pub fn new(config: HostConfig) -> Self {
        Self {
            state: State::with_config(config),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new()?;
        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ".exit" || trimmed == ".quit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    if let Some(value) = self.state.evaluate(trimmed) {
                        if !value.is_undefined() {
                            println!("{value:?}");
                        }
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}
