//! Fixed-capacity log line formatting

use std::fmt::{self, Write};

use tracing::field::{Field, Visit};
use tracing::Event;

/// String buffer that silently truncates at `capacity` bytes
///
/// Truncation happens on a UTF-8 character boundary, so the content is
/// always valid text.
#[derive(Debug)]
pub struct LineBuffer {
    buf: String,
    capacity: usize,
    truncated: bool,
}

impl LineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: String::with_capacity(capacity),
            capacity,
            truncated: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Whether any input was cut off
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.truncated = false;
    }
}

impl Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.capacity - self.buf.len();
        if s.len() <= room {
            self.buf.push_str(s);
            return Ok(());
        }

        let mut cut = room;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        self.buf.push_str(&s[..cut]);
        self.truncated = true;
        Ok(())
    }
}

/// Render `event` as `LEVEL target: message key=value ...`
pub fn format_event(event: &Event<'_>, line: &mut LineBuffer) {
    let meta = event.metadata();
    let _ = write!(line, "{} {}:", meta.level(), meta.target());

    event.record(&mut LineVisitor {
        line: &mut *line,
        pass: Pass::Message,
    });
    event.record(&mut LineVisitor {
        line,
        pass: Pass::Fields,
    });
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    Message,
    Fields,
}

/// Writes either the message or the remaining fields, depending on pass
struct LineVisitor<'a> {
    line: &'a mut LineBuffer,
    pass: Pass,
}

impl Visit for LineVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        let _ = match (self.pass, field.name() == "message") {
            (Pass::Message, true) => write!(self.line, " {}", value),
            (Pass::Fields, false) => write!(self.line, " {}={}", field.name(), value),
            _ => Ok(()),
        };
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let _ = match (self.pass, field.name() == "message") {
            (Pass::Message, true) => write!(self.line, " {:?}", value),
            (Pass::Fields, false) => write!(self.line, " {}={:?}", field.name(), value),
            _ => Ok(()),
        };
    }
}
