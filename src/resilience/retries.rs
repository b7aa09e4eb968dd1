//! Retry logic for the response write path.
//!
//! # Responsibilities
//! - Write a whole response to a non-blocking socket
//! - Retry a bounded number of times when the socket would block
//!
//! # Design Decisions
//! - Only writes retry; reads wait for the next readiness event instead
//! - Responses are small, so a few short sleeps are cheaper than
//!   re-registering the socket for write readiness
//! - `Interrupted` retries immediately and does not consume an attempt

use std::io::{self, Write};
use std::time::Duration;

use crate::resilience::backoff::calculate_backoff;

/// Bounds for retrying a blocked write.
#[derive(Debug, Clone, Copy)]
pub struct WriteRetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for WriteRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_micros(50),
            max_delay: Duration::from_millis(1),
        }
    }
}

/// Write all of `buf`, sleeping between attempts when the writer would block.
pub fn write_all_with_retry<W: Write>(
    writer: &mut W,
    mut buf: &[u8],
    policy: WriteRetryPolicy,
) -> io::Result<()> {
    let mut retries = 0;
    while !buf.is_empty() {
        match writer.write(buf) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock && retries < policy.max_attempts => {
                retries += 1;
                std::thread::sleep(calculate_backoff(
                    retries,
                    policy.base_delay,
                    policy.max_delay,
                ));
            }
            Err(e) => return Err(e),
        }
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer that fails with a scripted error before accepting bytes.
    struct Scripted {
        errors: Vec<io::ErrorKind>,
        chunk: usize,
        written: Vec<u8>,
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.errors.pop() {
                return Err(kind.into());
            }
            let n = buf.len().min(self.chunk);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_in_partial_chunks() {
        let mut w = Scripted {
            errors: vec![],
            chunk: 3,
            written: vec![],
        };
        write_all_with_retry(&mut w, b"hello world", WriteRetryPolicy::default()).unwrap();
        assert_eq!(w.written, b"hello world");
    }

    #[test]
    fn retries_would_block_within_budget() {
        let mut w = Scripted {
            errors: vec![io::ErrorKind::WouldBlock; 4],
            chunk: 64,
            written: vec![],
        };
        write_all_with_retry(&mut w, b"ok", WriteRetryPolicy::default()).unwrap();
        assert_eq!(w.written, b"ok");
    }

    #[test]
    fn gives_up_after_budget() {
        let mut w = Scripted {
            errors: vec![io::ErrorKind::WouldBlock; 5],
            chunk: 64,
            written: vec![],
        };
        let err = write_all_with_retry(&mut w, b"ok", WriteRetryPolicy::default()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn interrupted_does_not_count() {
        let mut w = Scripted {
            errors: vec![io::ErrorKind::Interrupted; 10],
            chunk: 64,
            written: vec![],
        };
        write_all_with_retry(&mut w, b"ok", WriteRetryPolicy::default()).unwrap();
    }

    #[test]
    fn other_errors_fail_fast() {
        let mut w = Scripted {
            errors: vec![io::ErrorKind::BrokenPipe],
            chunk: 64,
            written: vec![],
        };
        let err = write_all_with_retry(&mut w, b"ok", WriteRetryPolicy::default()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
