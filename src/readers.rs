use std::io::{self, BufRead};
use std::string::FromUtf8Error;
use thiserror::Error;

/// Why a line could not be produced
#[derive(Debug, Error)]
pub enum LineError {
    /// The line was read but is not UTF-8; the reader is still usable
    #[error("line is not valid UTF-8: {0}")]
    Decode(#[source] FromUtf8Error),

    /// The underlying stream failed (I/O, corrupt compression); the input ends here
    #[error("failed to read input: {0}")]
    Read(#[source] io::Error),
}

/// Newline-delimited lines read as bytes, then decoded
///
/// Unlike `BufRead::lines`, a read error is reported once and ends the
/// input, because retrying a broken stream yields the same error forever.
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = Result<String, LineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                let bytes = std::mem::take(&mut self.buf);
                Some(String::from_utf8(bytes).map_err(LineError::Decode))
            }
            Err(e) => {
                self.done = true;
                Some(Err(LineError::Read(e)))
            }
        }
    }
}
