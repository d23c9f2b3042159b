// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ToUnicode CMap parsing: `bfchar` and `bfrange` sections only, which is what
// PDF producers emit for text extraction.

use std::collections::HashMap;

use tracing::warn;

/// Character code to Unicode mapping read from a `/ToUnicode` stream.
#[derive(Debug, Clone, Default)]
pub(crate) struct ToUnicodeMap {
    map: HashMap<u32, String>,
    /// Width in bytes of the source codes seen in the map.
    code_bytes: usize,
}

#[derive(Debug, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

impl ToUnicodeMap {
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut cmap = ToUnicodeMap::default();
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(word) if word == "beginbfchar" => {
                    i += 1;
                    while i + 1 < tokens.len() {
                        match (&tokens[i], &tokens[i + 1]) {
                            (Token::Hex(src), Token::Hex(dst)) => {
                                cmap.insert(src, utf16_be(dst));
                                i += 2;
                            }
                            _ => break,
                        }
                    }
                }
                Token::Word(word) if word == "beginbfrange" => {
                    i += 1;
                    i = cmap.parse_ranges(&tokens, i);
                }
                _ => i += 1,
            }
        }
        cmap
    }

    /// Parse `<lo> <hi> <dst>` and `<lo> <hi> [<d0> <d1> ...]` entries,
    /// returning the index after the last consumed token.
    fn parse_ranges(&mut self, tokens: &[Token], mut i: usize) -> usize {
        while i + 2 < tokens.len() {
            let (lo_bytes, hi_bytes) = match (&tokens[i], &tokens[i + 1]) {
                (Token::Hex(lo), Token::Hex(hi)) => (lo, hi),
                _ => break,
            };
            let lo = be_value(lo_bytes);
            let hi = be_value(hi_bytes);
            // A range may only vary the last byte of the code.
            let valid = lo <= hi && lo >> 8 == hi >> 8;
            if !valid {
                warn!(lo, hi, "Malformed bfrange skipped");
            }
            match &tokens[i + 2] {
                Token::Hex(dst) => {
                    if valid {
                        let base = utf16_be(dst);
                        for (offset, code) in (lo..=hi).enumerate() {
                            self.insert_code(code, lo_bytes.len(), increment_last(&base, offset as u32));
                        }
                    }
                    i += 3;
                }
                Token::ArrayStart => {
                    let mut j = i + 3;
                    let mut code = lo;
                    while j < tokens.len() && tokens[j] != Token::ArrayEnd {
                        if let Token::Hex(dst) = &tokens[j] {
                            if valid && code <= hi {
                                self.insert_code(code, lo_bytes.len(), utf16_be(dst));
                            }
                            code += 1;
                        }
                        j += 1;
                    }
                    i = j + 1;
                }
                _ => break,
            }
        }
        i
    }

    fn insert(&mut self, src: &[u8], text: String) {
        self.insert_code(be_value(src), src.len(), text);
    }

    fn insert_code(&mut self, code: u32, width: usize, text: String) {
        self.code_bytes = self.code_bytes.max(width);
        self.map.insert(code, text);
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    /// Byte width of codes in this map (0 when the map is empty).
    pub fn code_bytes(&self) -> usize {
        self.code_bytes
    }
}

fn be_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Add `offset` to the last character of `base` (bfrange destination rule).
fn increment_last(base: &str, offset: u32) -> String {
    if offset == 0 {
        return base.to_string();
    }
    let mut chars: Vec<char> = base.chars().collect();
    if let Some(last) = chars.last_mut() {
        *last = char::from_u32(*last as u32 + offset).unwrap_or(char::REPLACEMENT_CHARACTER);
    }
    chars.into_iter().collect()
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        match byte {
            b'<' => {
                let end = data[i + 1..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map(|p| i + 1 + p)
                    .unwrap_or(data.len());
                let digits: Vec<u8> = data[i + 1..end]
                    .iter()
                    .copied()
                    .filter(u8::is_ascii_hexdigit)
                    .collect();
                tokens.push(Token::Hex(hex_bytes(&digits)));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'[' | b']' | b'%' | b'/')
                {
                    i += 1;
                }
                if i == start {
                    // Leading '/' of a name.
                    i += 1;
                    continue;
                }
                tokens.push(Token::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }
    tokens
}

fn hex_bytes(digits: &[u8]) -> Vec<u8> {
    let nibble = |d: u8| -> u8 {
        match d {
            b'0'..=b'9' => d - b'0',
            b'a'..=b'f' => d - b'a' + 10,
            b'A'..=b'F' => d - b'A' + 10,
            _ => 0,
        }
    };
    digits
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (nibble(*hi) << 4) | nibble(*lo),
            [hi] => nibble(*hi) << 4,
            _ => 0,
        })
        .collect()
}
