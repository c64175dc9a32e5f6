// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support for in-kernel debugging.
//!
//! Drivers call `debug!` from any context, including interrupt handlers.
//! Messages are formatted into a fixed-size in-memory buffer, prefixed with
//! the file and line of the call, and stay there until the board drains them
//! into a console with [`flush`]. Nothing here blocks or allocates: when the
//! buffer is full the remainder of a message is dropped and counted.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! debug!("Yes the code gets here with value {}", i);
//! ```
//!
//! ```text
//! TOCK_DEBUG: chips/jz4740/src/udc/mod.rs:112: Yes the code gets here with value 42
//! ```

use core::cell::UnsafeCell;
use core::fmt::{write, Arguments, Result, Write};
use core::sync::atomic::{AtomicBool, Ordering};

/// Size of the in-memory debug output buffer.
pub const DEBUG_BUFFER_LEN: usize = 1024;

/// A sink for debug output, typically a UART console.
pub trait IoWrite {
    /// Write as much of `buf` as the device accepts and return how many bytes
    /// were consumed.
    fn write(&mut self, buf: &[u8]) -> usize;
}

/// Ring buffer holding formatted debug output until it is flushed.
pub struct DebugWriter {
    output_buffer: [u8; DEBUG_BUFFER_LEN],
    output_head: usize,
    output_len: usize,
    dropped_bytes: usize,
}

impl DebugWriter {
    pub const fn new() -> Self {
        DebugWriter {
            output_buffer: [0; DEBUG_BUFFER_LEN],
            output_head: 0,
            output_len: 0,
            dropped_bytes: 0,
        }
    }

    /// Number of bytes waiting to be flushed.
    pub fn buffered(&self) -> usize {
        self.output_len
    }

    /// Number of bytes dropped because the buffer was full.
    pub fn dropped_bytes(&self) -> usize {
        self.dropped_bytes
    }

    fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if self.output_len == DEBUG_BUFFER_LEN {
                self.dropped_bytes += 1;
                continue;
            }
            let tail = (self.output_head + self.output_len) % DEBUG_BUFFER_LEN;
            self.output_buffer[tail] = byte;
            self.output_len += 1;
        }
    }

    /// Drain buffered output into `sink` until it is empty or the sink stops
    /// accepting bytes.
    pub fn flush(&mut self, sink: &mut dyn IoWrite) {
        while self.output_len > 0 {
            let end = core::cmp::min(self.output_head + self.output_len, DEBUG_BUFFER_LEN);
            let chunk = &self.output_buffer[self.output_head..end];
            let written = core::cmp::min(sink.write(chunk), chunk.len());

            self.output_head = (self.output_head + written) % DEBUG_BUFFER_LEN;
            self.output_len -= written;
            if written < chunk.len() {
                break;
            }
        }
        if self.output_len == 0 {
            self.output_head = 0;
        }
    }
}

impl Write for DebugWriter {
    fn write_str(&mut self, s: &str) -> Result {
        self.push(s.as_bytes());
        Ok(())
    }
}

/// The kernel-wide writer. The `busy` flag makes a nested `debug!` (for
/// example from an interrupt that fired while a message was being formatted)
/// drop its message instead of aliasing the buffer.
struct GlobalDebugWriter {
    busy: AtomicBool,
    writer: UnsafeCell<DebugWriter>,
}

// Access to `writer` is serialized by `busy`.
unsafe impl Sync for GlobalDebugWriter {}

static DEBUG_WRITER: GlobalDebugWriter = GlobalDebugWriter {
    busy: AtomicBool::new(false),
    writer: UnsafeCell::new(DebugWriter::new()),
};

/// Run `f` with exclusive access to the kernel debug writer.
///
/// Returns `None` if the writer is already in use further up the stack.
pub fn with_debug_writer<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut DebugWriter) -> R,
{
    if DEBUG_WRITER.busy.swap(true, Ordering::Acquire) {
        return None;
    }
    // Safety: `busy` was false and is now held by us.
    let result = f(unsafe { &mut *DEBUG_WRITER.writer.get() });
    DEBUG_WRITER.busy.store(false, Ordering::Release);
    Some(result)
}

/// Drain the kernel debug buffer into a console.
pub fn flush(sink: &mut dyn IoWrite) {
    with_debug_writer(|writer| writer.flush(sink));
}

fn write_message(writer: &mut DebugWriter, args: Arguments, file_line: &(&'static str, u32)) {
    let (file, line) = *file_line;
    let _ = writer.write_fmt(format_args!("TOCK_DEBUG: {}:{}: ", file, line));
    let _ = write(writer, args);
    let _ = writer.write_str("\r\n");
}

pub fn begin_debug_fmt(args: Arguments, file_line: &(&'static str, u32)) {
    with_debug_writer(|writer| write_message(writer, args, file_line));
}

pub fn begin_debug(msg: &str, file_line: &(&'static str, u32)) {
    with_debug_writer(|writer| write_message(writer, format_args!("{}", msg), file_line));
}

/// In-kernel `println()` debugging.
#[macro_export]
macro_rules! debug {
    () => ({
        // Allow an empty debug!() to print the location when hit
        $crate::debug!("")
    });
    ($msg:expr) => ({
        $crate::debug::begin_debug($msg, {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::begin_debug_fmt(format_args!($fmt, $($arg)+), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
}
