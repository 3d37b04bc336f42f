//! Attribution: the `(fullname, email, date)` triple fast-import attaches
//! to `author`, `committer`, and `tagger` lines (SPEC_FULL.md §3).
//!
//! The zone offset is preserved exactly as read: it is data the source
//! stream chose, not a presentation detail. `Attribution` stores a
//! `chrono::DateTime<FixedOffset>` rather than normalizing to UTC.

use std::fmt::Display;

use chrono::{DateTime, FixedOffset, TimeZone};

use crate::errors::{Result, SurgeryError};

/// A parsed `author`/`committer`/`tagger` line's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub fullname: String,
    pub email: String,
    pub date: DateTime<FixedOffset>,
}

impl Attribution {
    pub fn new(fullname: impl Into<String>, email: impl Into<String>, date: DateTime<FixedOffset>) -> Self {
        Attribution {
            fullname: fullname.into(),
            email: email.into(),
            date,
        }
    }

    /// Parses the payload of a line like:
    /// `A U Thor <author@example.com> 1257894000 +0000`
    /// (the `author `/`committer `/`tagger ` keyword must already be stripped).
    pub fn parse(line: &str) -> Result<Self> {
        let open = line
            .find('<')
            .ok_or_else(|| SurgeryError::parse(format!("attribution missing `<`: {line}")))?;
        let close = line
            .find('>')
            .ok_or_else(|| SurgeryError::parse(format!("attribution missing `>`: {line}")))?;
        if close < open {
            return Err(SurgeryError::parse(format!(
                "attribution has `>` before `<`: {line}"
            )));
        }
        let fullname = line[..open].trim().to_string();
        let email = line[open + 1..close].to_string();
        let rest = line[close + 1..].trim();

        let mut parts = rest.split_whitespace();
        let epoch = parts
            .next()
            .ok_or_else(|| SurgeryError::parse(format!("attribution missing timestamp: {line}")))?;
        let tz = parts
            .next()
            .ok_or_else(|| SurgeryError::parse(format!("attribution missing zone offset: {line}")))?;

        let epoch: i64 = epoch
            .parse()
            .map_err(|e| SurgeryError::parse(format!("bad timestamp `{epoch}`: {e}")))?;
        let offset = parse_zone_offset(tz)?;
        let date = offset
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| SurgeryError::parse(format!("timestamp out of range: {epoch}")))?;

        Ok(Attribution::new(fullname, email, date))
    }

    /// Renders back to the fast-import line payload, inverse of `parse`.
    pub fn to_line(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.fullname,
            self.email,
            self.date.timestamp(),
            self.date.format("%z")
        )
    }
}

impl Display for Attribution {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_line())
    }
}

fn parse_zone_offset(tz: &str) -> Result<FixedOffset> {
    if tz.len() != 5 || (tz.as_bytes()[0] != b'+' && tz.as_bytes()[0] != b'-') {
        return Err(SurgeryError::parse(format!("malformed zone offset: {tz}")));
    }
    let sign = if tz.as_bytes()[0] == b'-' { -1 } else { 1 };
    let hours: i32 = tz[1..3]
        .parse()
        .map_err(|e| SurgeryError::parse(format!("bad zone offset `{tz}`: {e}")))?;
    let minutes: i32 = tz[3..5]
        .parse()
        .map_err(|e| SurgeryError::parse(format!("bad zone offset `{tz}`: {e}")))?;
    let seconds = sign * (hours * 3600 + minutes * 60);
    FixedOffset::east_opt(seconds)
        .ok_or_else(|| SurgeryError::parse(format!("zone offset out of range: {tz}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_typical_attribution() {
        let line = "A U Thor <author@example.com> 1257894000 +0000";
        let attr = Attribution::parse(line).unwrap();
        assert_eq!(attr.fullname, "A U Thor");
        assert_eq!(attr.email, "author@example.com");
        assert_eq!(attr.to_line(), line);
    }

    #[test]
    fn preserves_nonzero_zone_offset() {
        let line = "A U Thor <author@example.com> 1257894000 -0500";
        let attr = Attribution::parse(line).unwrap();
        assert_eq!(attr.date.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(attr.to_line(), line);
    }

    #[test]
    fn rejects_missing_angle_brackets() {
        assert!(Attribution::parse("A U Thor author@example.com 0 +0000").is_err());
    }
}
