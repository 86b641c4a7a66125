use std::{
    io::{self, IsTerminal},
    path::PathBuf,
};

use rustyline::{DefaultEditor, error::ReadlineError};
use tracing::{info, warn};

use crate::session::{Input, LineSource};

/// Terminal input with line editing and optional persistent history.
pub struct Editor {
    editor: DefaultEditor,
    history_file: Option<PathBuf>,
}

impl Editor {
    pub fn new(history_file: Option<PathBuf>) -> rustyline::Result<Self> {
        let mut editor = DefaultEditor::new()?;
        if let Some(path) = &history_file {
            match editor.load_history(path) {
                Ok(()) => info!("Loaded history from {}", path.display()),
                Err(err) => info!("No history loaded from {}: {err}", path.display()),
            }
        }
        Ok(Self {
            editor,
            history_file,
        })
    }
}

impl LineSource for Editor {
    fn read_line(&mut self, prompt: &str) -> io::Result<Input> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                        warn!("Could not record history entry: {err}");
                    }
                }
                Ok(Input::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Eof) => Ok(Input::End),
            Err(ReadlineError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::other(err)),
        }
    }

    fn is_terminal(&self) -> bool {
        io::stdin().is_terminal()
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        let Some(path) = &self.history_file else {
            return;
        };
        if let Err(err) = self.editor.save_history(path) {
            warn!("Could not save history to {}: {err}", path.display());
        }
    }
}
