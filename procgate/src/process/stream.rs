//! Child stdio streams owned by a [`ProcessHandle`](super::ProcessHandle).

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::sync::{lock, try_lock};

/// Parent end of the child's stdin.
pub type StdinStream = Stream<BufWriter<File>>;
/// Parent end of the child's stdout.
pub type StdoutStream = Stream<BufReader<File>>;
/// Parent end of the child's stderr. Unbuffered.
pub type StderrStream = Stream<File>;

/// Releases the underlying descriptor, reporting any final flush failure.
pub trait Close {
    fn close(self) -> io::Result<()>;
}

impl Close for File {
    fn close(self) -> io::Result<()> {
        drop(self);
        Ok(())
    }
}

impl Close for BufReader<File> {
    fn close(self) -> io::Result<()> {
        drop(self);
        Ok(())
    }
}

impl Close for BufWriter<File> {
    fn close(self) -> io::Result<()> {
        self.into_inner()
            .map(drop)
            .map_err(io::IntoInnerError::into_error)
    }
}

/// A stdio stream that can be read or written through a shared reference
/// and closed once by its owner.
///
/// `&Stream<R>` implements [`Read`] and `&Stream<W>` implements [`Write`].
/// After closing, every operation fails with [`io::ErrorKind::BrokenPipe`].
///
/// Closing never waits for I/O in progress on another thread. A stream that is
/// busy when closed is released by that thread as soon as its operation
/// returns.
pub struct Stream<T> {
    name: &'static str,
    closed: AtomicBool,
    inner: Mutex<Option<T>>,
}

impl<T> Stream<T> {
    pub(crate) fn new(name: &'static str, inner: T) -> Self {
        Self {
            name,
            closed: AtomicBool::new(false),
            inner: Mutex::new(Some(inner)),
        }
    }

    /// Stream name: `stdin`, `stdout` or `stderr`.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the stream has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Run `f` with exclusive access to the open stream.
    ///
    /// Useful for [`BufRead`](std::io::BufRead) methods on stdout.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::BrokenPipe`] if the stream is closed.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> io::Result<R> {
        if self.is_closed() {
            return Err(self.closed());
        }

        let result = {
            let mut inner = lock(&self.inner);
            if self.is_closed() {
                drop(inner.take());
                return Err(self.closed());
            }
            let stream = inner.as_mut().ok_or_else(|| self.closed())?;
            f(stream)
        };

        // `close` may have run while `f` was blocked.
        if self.is_closed() {
            drop(self.release());
        }
        Ok(result)
    }

    /// Take the inner stream unless another thread is using it; that thread
    /// releases it when its operation returns.
    fn release(&self) -> Option<T> {
        try_lock(&self.inner).and_then(|mut inner| inner.take())
    }

    fn closed(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::BrokenPipe,
            format!("{} is closed", self.name),
        )
    }
}

impl<T: Close> Stream<T> {
    /// Close the stream. Closing twice is a no-op.
    ///
    /// Closing stdin is how a child is sent end-of-file. Returns immediately
    /// even if another thread is blocked reading or writing.
    ///
    /// # Errors
    ///
    /// Returns the error from flushing buffered stdin data, if any.
    pub fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.release().map_or(Ok(()), Close::close)
    }
}

impl<T: Read> Read for &Stream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.with(|stream| stream.read(buf))?
    }
}

impl<T: Write> Write for &Stream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with(|stream| stream.write(buf))?
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with(|stream| stream.flush())?
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
