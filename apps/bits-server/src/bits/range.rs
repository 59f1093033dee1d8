//! `Content-Range` codec
//!
//! Only the `bytes <start>-<end>/<total>` form is accepted. Structural
//! problems and bad numbers are reported separately for diagnostics, the
//! wire outcome is the same for both.

use thiserror::Error;

const PREFIX: &str = "bytes ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid range syntax")]
    Syntax,

    #[error("invalid number {0:?}")]
    Number(String),
}

/// Parsed byte range with an inclusive end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ContentRange {
    pub fn parse(header: &str) -> Result<Self, RangeError> {
        let rest = header.strip_prefix(PREFIX).ok_or(RangeError::Syntax)?;
        let (span, total) = rest.split_once('/').ok_or(RangeError::Syntax)?;
        if total.contains('/') {
            return Err(RangeError::Syntax);
        }
        let total = parse_number(total)?;

        let (start, end) = span.split_once('-').ok_or(RangeError::Syntax)?;
        if end.contains('-') {
            return Err(RangeError::Syntax);
        }

        Ok(Self {
            start: parse_number(start)?,
            end: parse_number(end)?,
            total,
        })
    }

    /// Number of bytes the range covers, `None` when `end < start`
    pub fn len(&self) -> Option<u64> {
        self.end
            .checked_sub(self.start)
            .and_then(|span| span.checked_add(1))
    }

    /// Whether this range carries the final byte of the file
    pub fn is_last(&self) -> bool {
        self.end.checked_add(1) == Some(self.total)
    }
}

fn parse_number(value: &str) -> Result<u64, RangeError> {
    parse_decimal(value).ok_or_else(|| RangeError::Number(value.to_string()))
}

/// Plain ASCII digits only; `u64::from_str` would also take a leading '+'
pub(crate) fn parse_decimal(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_range() {
        let range = ContentRange::parse("bytes 10-20/100").unwrap();
        assert_eq!(range, ContentRange { start: 10, end: 20, total: 100 });
        assert_eq!(range.len(), Some(11));
        assert!(!range.is_last());

        let range = ContentRange::parse("bytes 0-9/10").unwrap();
        assert!(range.is_last());
    }

    #[test]
    fn test_structural_errors() {
        for input in ["a", "bytes a", "bytes a/100", "bytes 1-2-3/100", "bytes 1-2/3/4", "bytes=0-1/2", "bytes -1-20/100", ""] {
            assert_eq!(ContentRange::parse(input), Err(RangeError::Syntax), "{input}");
        }
    }

    #[test]
    fn test_number_errors() {
        for input in ["bytes a/a", "bytes a-20/100", "bytes 10-a/100", "bytes 10-20/", "bytes +1-20/100", "bytes 0-1/99999999999999999999"] {
            let err = ContentRange::parse(input).unwrap_err();
            assert!(matches!(err, RangeError::Number(_)), "{input}: {err:?}");
        }
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("0"), Some(0));
        assert_eq!(parse_decimal("0042"), Some(42));
        assert_eq!(parse_decimal("18446744073709551615"), Some(u64::MAX));

        for input in ["", "+10", "-1", " 1", "1 ", "1e3", "18446744073709551616"] {
            assert_eq!(parse_decimal(input), None, "{input:?}");
        }
    }

    #[test]
    fn test_inverted_range_has_no_length() {
        let range = ContentRange::parse("bytes 20-10/100").unwrap();
        assert_eq!(range.len(), None);
    }

    #[test]
    fn test_full_u64_range_does_not_overflow() {
        let range = ContentRange {
            start: 0,
            end: u64::MAX,
            total: u64::MAX,
        };
        assert_eq!(range.len(), None);
        assert!(!range.is_last());
    }
}
