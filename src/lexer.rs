// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Token scanner for liberty (.lib) text.
//!
//! Liberty files are line oriented: `/* ... */` comments may span lines, a
//! trailing backslash joins a line with the next one, and quoted or
//! parenthesized spans are read as single tokens. The scanner works through
//! the file one logical line at a time and hands out tokens on demand, in two
//! modes selected per call:
//!
//! - without a delimiter, tokens split on whitespace and the punctuation
//!   characters `( ) { } " : ;` come back as standalone one-character tokens;
//! - with a delimiter, everything up to the (nesting-aware) delimiter is one
//!   token, which may span several physical lines.

use std::io::BufRead;

/// Streaming tokenizer over liberty text.
///
/// Keeps the current logical line, a byte cursor into it, and a physical line
/// counter for diagnostics.
pub struct TokenScanner<R> {
    source: R,
    line: String,
    pos: usize,
    line_no: usize,
    in_comment: bool,
}

impl<R: BufRead> TokenScanner<R> {
    pub fn new(source: R) -> Self {
        TokenScanner {
            source,
            line: String::new(),
            pos: 0,
            line_no: 0,
            in_comment: false,
        }
    }

    /// Number of physical lines read so far.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Pull the next logical line into the buffer, joining continuation
    /// lines (trailing backslash) as it goes. Returns false at end of input
    /// with nothing buffered. A failed read counts as end of input.
    fn refill(&mut self) -> bool {
        self.line.clear();
        self.pos = 0;
        loop {
            let n = match self.source.read_line(&mut self.line) {
                Ok(n) => n,
                Err(_) => 0,
            };
            if n == 0 {
                // At end of input a pending continuation tail is kept.
                return !self.line.is_empty();
            }
            self.line_no += 1;
            if self.line.ends_with('\n') {
                self.line.pop();
            }
            if self.line.ends_with('\r') {
                self.line.pop();
            }
            let trimmed = self.line.trim_end();
            if trimmed.ends_with('\\') {
                let keep = trimmed.len() - 1;
                self.line.truncate(keep);
                continue;
            }
            return true;
        }
    }

    /// Return the next token, or `None` at end of input.
    ///
    /// With `delimiter == None`, the token ends at whitespace or at one of
    /// the standalone punctuation characters (which terminates the token and
    /// stays put for the next call, or is itself the token when nothing has
    /// accumulated yet). With a delimiter, the token is everything up to the
    /// delimiter; when the delimiter is `)` or `}`, occurrences of the paired
    /// opener nest. Tokens come back trimmed of surrounding whitespace.
    pub fn next_token(&mut self, delimiter: Option<char>) -> Option<String> {
        let mut token = String::new();
        let mut nest = 0usize;
        let delim = delimiter.map(|c| c as u8);

        loop {
            // Position the cursor on scannable text: refill exhausted lines
            // and strip comments, which may span line boundaries.
            loop {
                if self.in_comment {
                    match self.line[self.pos..].find("*/") {
                        Some(off) => {
                            self.pos += off + 2;
                            self.in_comment = false;
                            continue;
                        }
                        None => {
                            if !self.refill() {
                                return finish(token);
                            }
                            continue;
                        }
                    }
                }
                if self.pos >= self.line.len() {
                    if !self.refill() {
                        return finish(token);
                    }
                    continue;
                }
                if self.line[self.pos..].starts_with("/*") {
                    self.pos += 2;
                    self.in_comment = true;
                    continue;
                }
                break;
            }

            // Whitespace never begins a token (and continuation text picks
            // up past the leading indentation of the joined line).
            {
                let bytes = self.line.as_bytes();
                while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
                    self.pos += 1;
                }
            }

            let bytes = self.line.as_bytes();
            let start = self.pos;
            let mut p = self.pos;
            match delim {
                Some(d) => {
                    while p < bytes.len() {
                        if bytes[p] == b'/' && bytes[p..].starts_with(b"/*") {
                            break;
                        }
                        if bytes[p] == d {
                            if nest > 0 {
                                nest -= 1;
                            } else {
                                break;
                            }
                        }
                        if (d == b'}' && bytes[p] == b'{') || (d == b')' && bytes[p] == b'(') {
                            nest += 1;
                        }
                        p += 1;
                    }
                    token.push_str(&self.line[start..p]);
                    self.pos = p;
                    if p < bytes.len() && bytes[p] == d {
                        self.pos += 1;
                        return Some(token.trim().to_string());
                    }
                    // Hit end of line or a comment: keep accumulating.
                }
                None => {
                    while p < bytes.len() {
                        let b = bytes[p];
                        if b == b'/' && bytes[p..].starts_with(b"/*") {
                            break;
                        }
                        if b.is_ascii_whitespace() {
                            break;
                        }
                        if matches!(b, b'(' | b')' | b'{' | b'}' | b'"' | b':' | b';') {
                            if p == start {
                                p += 1;
                            }
                            break;
                        }
                        p += 1;
                    }
                    token.push_str(&self.line[start..p]);
                    self.pos = p;
                    if !token.trim().is_empty() {
                        return Some(token.trim().to_string());
                    }
                    // Nothing but whitespace on this stretch; scan on.
                }
            }
        }
    }
}

fn finish(token: String) -> Option<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
