//! Codec for the gateway's `array_serialize` response format.
//!
//! The REST API answers with PHP `serialize()` output. This module is the only
//! place that knows the byte layout; everything else works on
//! [`serde_json::Value`].
//!
//! | PHP value      | wire form                     | decoded as                   |
//! |----------------|-------------------------------|------------------------------|
//! | `null`         | `N;`                          | `Value::Null`                |
//! | bool           | `b:1;`                        | `Value::Bool`                |
//! | int            | `i:42;`                       | `Value::Number`              |
//! | float          | `d:0.5;`                      | `Value::Number`              |
//! | string         | `s:5:"hello";` (byte length)  | `Value::String`              |
//! | array          | `a:1:{i:0;s:1:"x";}`          | `Value::Object`, keys as text |
//!
//! PHP arrays are ordered maps, so every array decodes to an object whose keys
//! are the stringified PHP keys in wire order. Objects (`O:`) and references
//! (`r:`/`R:`) are not part of the gateway vocabulary and are rejected.
//!
//! String lengths count bytes, so callers hand the body over as received. A
//! string payload that is not valid UTF-8 is read as ISO-8859-1.

use serde_json::{Map, Number, Value};

/// Deepest array nesting accepted before decoding gives up.
pub const MAX_DEPTH: usize = 64;

/// Decoding failure, with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEnd(usize),

    #[error("expected '{expected}' at byte {offset}, found '{found}'")]
    Unexpected {
        expected: char,
        found: char,
        offset: usize,
    },

    #[error("invalid number '{value}' at byte {offset}")]
    InvalidNumber { value: String, offset: usize },

    #[error("unsupported type tag '{tag}' at byte {offset}")]
    Unsupported { tag: char, offset: usize },

    #[error("array keys must be int or string (byte {0})")]
    InvalidKey(usize),

    #[error("trailing data after value at byte {0}")]
    TrailingData(usize),

    #[error("arrays nested deeper than {max} levels at byte {offset}")]
    TooDeep { max: usize, offset: usize },
}

/// Decode a complete `array_serialize` body.
pub fn decode(input: &str) -> Result<Value, CodecError> {
    decode_bytes(input.as_bytes())
}

/// Decode raw bytes, as received from the gateway.
pub fn decode_bytes(input: &[u8]) -> Result<Value, CodecError> {
    let mut parser = Parser {
        input,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    if parser.pos != input.len() {
        return Err(CodecError::TrailingData(parser.pos));
    }
    Ok(value)
}

/// Encode a value in the gateway's wire format.
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("N;"),
        Value::Bool(b) => {
            out.push_str(if *b { "b:1;" } else { "b:0;" });
        }
        Value::Number(n) => {
            if n.is_f64() {
                out.push_str(&format!("d:{};", n));
            } else {
                out.push_str(&format!("i:{};", n));
            }
        }
        Value::String(s) => encode_str(s, out),
        Value::Array(items) => {
            out.push_str(&format!("a:{}:{{", items.len()));
            for (index, item) in items.iter().enumerate() {
                out.push_str(&format!("i:{};", index));
                encode_into(item, out);
            }
            out.push('}');
        }
        Value::Object(map) => {
            out.push_str(&format!("a:{}:{{", map.len()));
            for (key, item) in map {
                encode_key(key, out);
                encode_into(item, out);
            }
            out.push('}');
        }
    }
}

fn encode_str(s: &str, out: &mut String) {
    out.push_str(&format!("s:{}:\"{}\";", s.len(), s));
}

// PHP casts canonical decimal strings to integer keys
fn encode_key(key: &str, out: &mut String) {
    match key.parse::<i64>() {
        Ok(n) if n.to_string() == key => out.push_str(&format!("i:{};", n)),
        _ => encode_str(key, out),
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn value(&mut self) -> Result<Value, CodecError> {
        let start = self.pos;
        let tag = self.next()?;
        match tag {
            b'N' => {
                self.expect(b';')?;
                Ok(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let raw = self.until(b';')?;
                match raw {
                    "0" => Ok(Value::Bool(false)),
                    "1" => Ok(Value::Bool(true)),
                    other => Err(CodecError::InvalidNumber {
                        value: other.to_string(),
                        offset: start,
                    }),
                }
            }
            b'i' => {
                self.expect(b':')?;
                let n = self.integer(b';')?;
                Ok(Value::Number(n.into()))
            }
            b'd' => {
                self.expect(b':')?;
                let raw = self.until(b';')?;
                raw.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| CodecError::InvalidNumber {
                        value: raw.to_string(),
                        offset: start,
                    })
            }
            b's' => {
                self.expect(b':')?;
                let s = self.string_body()?;
                Ok(Value::String(s))
            }
            b'a' => {
                self.expect(b':')?;
                if self.depth >= MAX_DEPTH {
                    return Err(CodecError::TooDeep {
                        max: MAX_DEPTH,
                        offset: start,
                    });
                }
                let count = self.length(b':')?;
                self.expect(b'{')?;
                self.depth += 1;
                let mut map = Map::new();
                for _ in 0..count {
                    let key = self.key()?;
                    let item = self.value()?;
                    map.insert(key, item);
                }
                self.depth -= 1;
                self.expect(b'}')?;
                Ok(Value::Object(map))
            }
            other => Err(CodecError::Unsupported {
                tag: other as char,
                offset: start,
            }),
        }
    }

    fn key(&mut self) -> Result<String, CodecError> {
        let start = self.pos;
        match self.next()? {
            b'i' => {
                self.expect(b':')?;
                Ok(self.integer(b';')?.to_string())
            }
            b's' => {
                self.expect(b':')?;
                self.string_body()
            }
            _ => Err(CodecError::InvalidKey(start)),
        }
    }

    // `<len>:"<bytes>";` after the `s:` prefix
    fn string_body(&mut self) -> Result<String, CodecError> {
        let len = self.length(b':')?;
        self.expect(b'"')?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or(CodecError::UnexpectedEnd(self.input.len()))?;
        let bytes = &self.input[self.pos..end];
        self.pos = end;
        self.expect(b'"')?;
        self.expect(b';')?;
        Ok(match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
        })
    }

    fn integer(&mut self, terminator: u8) -> Result<i64, CodecError> {
        let start = self.pos;
        let raw = self.until(terminator)?;
        raw.parse::<i64>().map_err(|_| CodecError::InvalidNumber {
            value: raw.to_string(),
            offset: start,
        })
    }

    fn length(&mut self, terminator: u8) -> Result<usize, CodecError> {
        let start = self.pos;
        let raw = self.until(terminator)?;
        raw.parse::<usize>().map_err(|_| CodecError::InvalidNumber {
            value: raw.to_string(),
            offset: start,
        })
    }

    /// Consume up to and including `terminator`, returning the text before it.
    fn until(&mut self, terminator: u8) -> Result<&'a str, CodecError> {
        let input: &'a [u8] = self.input;
        let start = self.pos;
        let rest = &input[start..];
        let offset = rest
            .iter()
            .position(|b| *b == terminator)
            .ok_or(CodecError::UnexpectedEnd(self.input.len()))?;
        self.pos = start + offset + 1;
        std::str::from_utf8(&rest[..offset]).map_err(|_| CodecError::InvalidNumber {
            value: String::from_utf8_lossy(&rest[..offset]).into_owned(),
            offset: start,
        })
    }

    fn next(&mut self) -> Result<u8, CodecError> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or(CodecError::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<(), CodecError> {
        let offset = self.pos;
        let found = self.next()?;
        if found != expected {
            return Err(CodecError::Unexpected {
                expected: expected as char,
                found: found as char,
                offset,
            });
        }
        Ok(())
    }
}
