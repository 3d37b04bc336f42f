//! Author map (SPEC_FULL.md §4.15, §6): `localname = Full Name <email>
//! [tz]` principal lines, with `+`-prefixed alias lines binding to the
//! most recently defined principal.

use std::collections::HashMap;

use crate::errors::{Result, SurgeryError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorPrincipal {
    pub fullname: String,
    pub email: String,
    /// IANA zone name or `±HHMM`, if given.
    pub tz: Option<String>,
}

#[derive(Debug, Default)]
pub struct AuthorMap {
    principals: HashMap<String, AuthorPrincipal>,
    aliases: HashMap<String, String>,
    order: Vec<String>,
}

impl AuthorMap {
    pub fn new() -> Self {
        AuthorMap::default()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut map = AuthorMap::new();
        let mut last_local: Option<String> = None;

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix('+') {
                let alias = rest.trim().split_whitespace().next().unwrap_or("").to_string();
                let local = last_local.as_ref().ok_or_else(|| {
                    SurgeryError::parse(format!(
                        "author map line {}: alias with no preceding principal",
                        lineno + 1
                    ))
                })?;
                map.aliases.insert(alias, local.clone());
                continue;
            }
            let (local, rhs) = line.split_once('=').ok_or_else(|| {
                SurgeryError::parse(format!("author map line {}: missing `=`", lineno + 1))
            })?;
            let local = local.trim().to_string();
            let rhs = rhs.trim();
            let open = rhs
                .find('<')
                .ok_or_else(|| SurgeryError::parse(format!("author map line {}: missing `<`", lineno + 1)))?;
            let close = rhs
                .find('>')
                .ok_or_else(|| SurgeryError::parse(format!("author map line {}: missing `>`", lineno + 1)))?;
            let fullname = rhs[..open].trim().to_string();
            let email = rhs[open + 1..close].to_string();
            let tz_text = rhs[close + 1..].trim();
            let tz = if tz_text.is_empty() {
                None
            } else {
                Some(tz_text.to_string())
            };
            map.principals.insert(
                local.clone(),
                AuthorPrincipal { fullname, email, tz },
            );
            map.order.push(local.clone());
            last_local = Some(local);
        }
        Ok(map)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for local in &self.order {
            let principal = &self.principals[local];
            out.push_str(local);
            out.push_str(" = ");
            out.push_str(&principal.fullname);
            out.push_str(" <");
            out.push_str(&principal.email);
            out.push('>');
            if let Some(tz) = &principal.tz {
                out.push(' ');
                out.push_str(tz);
            }
            out.push('\n');
        }
        for (alias, local) in &self.aliases {
            out.push('+');
            out.push_str(alias);
            out.push_str(" -> ");
            out.push_str(local);
            out.push('\n');
        }
        out
    }

    /// Resolves `localname`, following an alias to its bound principal if
    /// `localname` is itself an alias.
    pub fn resolve(&self, localname: &str) -> Option<&AuthorPrincipal> {
        let target = self.aliases.get(localname).map(String::as_str).unwrap_or(localname);
        self.principals.get(target)
    }
}
