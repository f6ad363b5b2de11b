//! Console sinks used by WRITE and READ
//!
//! Both are shared handles so a driver or test can keep a clone and
//! inspect what the program printed or feed it input.

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

/// Output sink for WRITE (defaults to stdout)
pub type OutputWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Line source for READ (defaults to stdin)
pub type InputReader = Arc<Mutex<Box<dyn BufRead + Send>>>;

/// Create an output writer that writes to stdout
pub fn stdout_writer() -> OutputWriter {
    Arc::new(Mutex::new(Box::new(std::io::stdout())))
}

/// Create an input reader over buffered stdin
pub fn stdin_reader() -> InputReader {
    Arc::new(Mutex::new(Box::new(std::io::BufReader::new(std::io::stdin()))))
}

/// Input reader over fixed text
pub fn string_reader(text: impl Into<String>) -> InputReader {
    Arc::new(Mutex::new(Box::new(std::io::Cursor::new(
        text.into().into_bytes(),
    ))))
}
