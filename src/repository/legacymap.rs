//! Legacy-ID map (SPEC_FULL.md §4.15, §6): a text table from external
//! identifiers (`SVN:N`, `CVS:path:rev`, `HG:hash`, raw `:N`) to the
//! action-stamp-like label of the commit they correspond to.

use crate::errors::{Result, SurgeryError};

#[derive(Debug, Default, Clone)]
pub struct LegacyMap {
    entries: Vec<(String, String)>,
}

impl LegacyMap {
    pub fn new() -> Self {
        LegacyMap::default()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut map = LegacyMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (cookie, stamp) = line.split_once('\t').ok_or_else(|| {
                SurgeryError::parse(format!("legacy map line {}: missing tab: {line}", lineno + 1))
            })?;
            map.set(cookie.trim().to_string(), stamp.trim().to_string());
        }
        Ok(map)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (cookie, stamp) in &self.entries {
            out.push_str(cookie);
            out.push('\t');
            out.push_str(stamp);
            out.push('\n');
        }
        out
    }

    pub fn get(&self, cookie: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == cookie)
            .map(|(_, s)| s.as_str())
    }

    pub fn set(&mut self, cookie: String, stamp: String) {
        if let Some(slot) = self.entries.iter_mut().find(|(c, _)| *c == cookie) {
            slot.1 = stamp;
        } else {
            self.entries.push((cookie, stamp));
        }
    }
}
