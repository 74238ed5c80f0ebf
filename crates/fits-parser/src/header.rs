//! FITS header parsing.
//!
//! Headers are sequences of 80-byte ASCII cards packed into 2880-byte
//! blocks. Each card carries an 8-byte keyword, an optional `= ` value
//! indicator, and a value with an optional `/ comment` trailer. The END
//! card terminates the header; the remainder of its block is padding.

use crate::error::{FitsError, Result};
use crate::{BLOCK_SIZE, CARD_SIZE};

/// A parsed header card value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Logical constant `T` or `F`.
    Logical(bool),
    /// Integer constant.
    Integer(i64),
    /// Real constant (FITS `D` exponents are accepted).
    Real(f64),
    /// Character string, quotes stripped and `''` unescaped.
    Text(String),
    /// No value (blank, commentary, or keyword-only card).
    Undefined,
}

impl Value {
    /// Name of the stored type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Logical(_) => "logical",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "string",
            Value::Undefined => "undefined",
        }
    }

    /// Interpret as a real number. Integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Interpret as an integer. Whole-valued reals are accepted since
    /// some pipelines write integer keywords in floating-point form.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Interpret as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret as a logical.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Logical(v) => Some(*v),
            _ => None,
        }
    }
}

/// One 80-byte header card.
#[derive(Debug, Clone)]
pub struct Card {
    pub keyword: String,
    pub value: Value,
    pub comment: Option<String>,
}

/// A parsed FITS header: the ordered cards of one header unit.
#[derive(Debug, Clone)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    /// Parse a header unit starting at the beginning of `data`.
    ///
    /// Returns the header and the number of bytes consumed, which is
    /// always a whole number of 2880-byte blocks.
    pub fn parse(data: &[u8]) -> Result<(Header, usize)> {
        let mut cards = Vec::new();
        let mut offset = 0;

        loop {
            if offset + BLOCK_SIZE > data.len() {
                return Err(FitsError::UnexpectedEof(format!(
                    "header block at offset {} runs past end of file",
                    offset
                )));
            }

            let block = &data[offset..offset + BLOCK_SIZE];
            offset += BLOCK_SIZE;

            for card_bytes in block.chunks_exact(CARD_SIZE) {
                let keyword = keyword_of(card_bytes);

                if keyword == "END" {
                    return Ok((Header { cards }, offset));
                }
                if keyword.is_empty() {
                    continue;
                }

                cards.push(parse_card(&keyword, card_bytes)?);
            }
        }
    }

    /// Look up a keyword's value. Exact (uppercase) keyword match, first
    /// occurrence wins.
    pub fn get(&self, keyword: &str) -> Option<&Value> {
        self.cards
            .iter()
            .find(|c| c.keyword == keyword)
            .map(|c| &c.value)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(Value::as_f64)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(Value::as_str)
    }

    pub fn get_bool(&self, keyword: &str) -> Option<bool> {
        self.get(keyword).and_then(Value::as_bool)
    }

    /// Integer lookup that fails with a descriptive error.
    pub fn require_i64(&self, keyword: &str) -> Result<i64> {
        let value = self
            .get(keyword)
            .ok_or_else(|| FitsError::MissingKeyword(keyword.to_string()))?;
        value.as_i64().ok_or_else(|| FitsError::WrongValueType {
            keyword: keyword.to_string(),
            expected: "integer",
            actual: value.type_name(),
        })
    }

    /// Real lookup that fails with a descriptive error.
    pub fn require_f64(&self, keyword: &str) -> Result<f64> {
        let value = self
            .get(keyword)
            .ok_or_else(|| FitsError::MissingKeyword(keyword.to_string()))?;
        value.as_f64().ok_or_else(|| FitsError::WrongValueType {
            keyword: keyword.to_string(),
            expected: "real",
            actual: value.type_name(),
        })
    }

    /// String lookup that fails with a descriptive error.
    pub fn require_str(&self, keyword: &str) -> Result<&str> {
        let value = self
            .get(keyword)
            .ok_or_else(|| FitsError::MissingKeyword(keyword.to_string()))?;
        value.as_str().ok_or_else(|| FitsError::WrongValueType {
            keyword: keyword.to_string(),
            expected: "string",
            actual: value.type_name(),
        })
    }
}

/// Extract the keyword from bytes 0-7 of a card.
fn keyword_of(card: &[u8]) -> String {
    String::from_utf8_lossy(&card[..8]).trim_end().to_string()
}

/// Parse one card.
///
/// Card layout:
///   bytes 0-7:  keyword, space padded
///   bytes 8-9:  "= " when a value is present
///   bytes 10-79: value, optionally followed by "/ comment"
///
/// COMMENT and HISTORY cards (and keyword-only cards without the value
/// indicator) carry their text as the comment and an undefined value.
fn parse_card(keyword: &str, card: &[u8]) -> Result<Card> {
    if keyword == "COMMENT" || keyword == "HISTORY" || &card[8..10] != b"= " {
        let text = String::from_utf8_lossy(&card[8..]).trim().to_string();
        return Ok(Card {
            keyword: keyword.to_string(),
            value: Value::Undefined,
            comment: if text.is_empty() { None } else { Some(text) },
        });
    }

    let raw = String::from_utf8_lossy(&card[10..]).to_string();
    let (value, comment) = parse_value(&raw).map_err(|reason| FitsError::InvalidCard {
        keyword: keyword.to_string(),
        reason,
    })?;

    Ok(Card {
        keyword: keyword.to_string(),
        value,
        comment,
    })
}

/// Parse the value field of a card, splitting off the trailing comment.
fn parse_value(raw: &str) -> std::result::Result<(Value, Option<String>), String> {
    let trimmed = raw.trim_start();

    if let Some(rest) = trimmed.strip_prefix('\'') {
        return parse_quoted(rest);
    }

    // Unquoted: the comment starts at the first slash.
    let (token, comment) = match trimmed.find('/') {
        Some(pos) => (trimmed[..pos].trim(), extract_comment(&trimmed[pos..])),
        None => (trimmed.trim(), None),
    };

    let value = match token {
        "" => Value::Undefined,
        "T" => Value::Logical(true),
        "F" => Value::Logical(false),
        _ => {
            if let Ok(v) = token.parse::<i64>() {
                Value::Integer(v)
            } else {
                // FITS reals may use a 'D' exponent marker.
                let normalized: String = token
                    .chars()
                    .map(|c| if c == 'D' || c == 'd' { 'E' } else { c })
                    .collect();
                match normalized.parse::<f64>() {
                    Ok(v) => Value::Real(v),
                    Err(_) => return Err(format!("unparseable value '{}'", token)),
                }
            }
        }
    };

    Ok((value, comment))
}

/// Parse a quoted string value. `body` starts just after the opening
/// quote. A doubled quote escapes a literal quote; trailing spaces inside
/// the string are not significant.
fn parse_quoted(body: &str) -> std::result::Result<(Value, Option<String>), String> {
    let chars: Vec<char> = body.chars().collect();
    let mut text = String::new();
    let mut i = 0;

    loop {
        match chars.get(i) {
            None => return Err("unterminated string value".to_string()),
            Some('\'') => {
                if chars.get(i + 1) == Some(&'\'') {
                    text.push('\'');
                    i += 2;
                } else {
                    i += 1;
                    break;
                }
            }
            Some(c) => {
                text.push(*c);
                i += 1;
            }
        }
    }

    let rest: String = chars[i..].iter().collect();
    let comment = match rest.find('/') {
        Some(pos) => extract_comment(&rest[pos..]),
        None => None,
    };

    Ok((Value::Text(text.trim_end().to_string()), comment))
}

fn extract_comment(slash_onward: &str) -> Option<String> {
    let text = slash_onward[1..].trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
