//! In-memory stand-in for a device, used by unit tests here and in
//! dependent crates (enable the `testing` feature).

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;

/// Byte stream that replays scripted reply chunks and records writes.
///
/// Each `read` call hands out at most one scripted chunk, the way a serial
/// port usually delivers one short line per read. When the script runs out
/// it reports a timeout, or end-of-stream if `eof` was set.
pub struct ScriptedStream {
    replies: VecDeque<Vec<u8>>,
    written: Rc<RefCell<Vec<u8>>>,
    reads: Rc<Cell<usize>>,
    eof: bool,
}

/// Handles kept by the test after the stream is moved into a session.
#[derive(Clone)]
pub struct Probe {
    written: Rc<RefCell<Vec<u8>>>,
    reads: Rc<Cell<usize>>,
}

impl Probe {
    pub fn written(&self) -> Vec<u8> {
        self.written.borrow().clone()
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written.borrow()).into_owned()
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    /// Forgets everything recorded so far.
    pub fn reset(&self) {
        self.written.borrow_mut().clear();
        self.reads.set(0);
    }
}

impl ScriptedStream {
    pub fn new<I, T>(replies: I) -> (Self, Probe)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let written = Rc::new(RefCell::new(Vec::new()));
        let reads = Rc::new(Cell::new(0));
        let stream = Self {
            replies: replies.into_iter().map(|r| r.as_ref().to_vec()).collect(),
            written: written.clone(),
            reads: reads.clone(),
            eof: false,
        };
        (stream, Probe { written, reads })
    }

    pub fn with_eof(mut self) -> Self {
        self.eof = true;
        self
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.set(self.reads.get() + 1);
        match self.replies.pop_front() {
            Some(mut chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.replies.push_front(chunk.split_off(n));
                }
                Ok(n)
            }
            None if self.eof => Ok(0),
            None => Err(io::Error::new(io::ErrorKind::TimedOut, "no scripted reply")),
        }
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
