//! C3 — push-back string: an accumulator the lexer appends decoded token
//! bytes into while scanning.
//!
//! The original (`examples/original_source/src/http/parser/utility/pushbackstring.hpp`)
//! is a fixed-size inline buffer that spills onto the heap past `size`
//! bytes, avoiding an allocation for the common short-token case. `String`
//! already amortizes its own growth the same way `malloc`/`realloc` do
//! here, so this is a thin wrapper rather than a reimplementation of the
//! two-buffer split — the inline/dynamic distinction buys nothing in Rust.

#[derive(Debug, Clone, Default)]
pub struct PushBackString {
    buf: String,
}

impl PushBackString {
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    pub fn push_back(&mut self, c: char) {
        self.buf.push(c);
    }

    pub fn append(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}
