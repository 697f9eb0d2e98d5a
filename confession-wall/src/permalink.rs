//! Shareable links
//!
//! `/confession/{id}` and `/reply/{id}`, where `{id}` is the store-assigned
//! identifier.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permalink {
    Confession(String),
    Reply(String),
}

impl Permalink {
    pub fn id(&self) -> &str {
        match self {
            Permalink::Confession(id) | Permalink::Reply(id) => id,
        }
    }

    /// Absolute URL under `origin`, e.g. `https://host` + `/confession/abc`
    pub fn url(&self, origin: &str) -> String {
        format!("{}{}", origin.trim_end_matches('/'), self)
    }

    /// Parse a path (or the path part of a URL) back into a link
    pub fn parse(input: &str) -> Option<Self> {
        let path = match input.find("://") {
            Some(scheme_end) => {
                let rest = &input[scheme_end + 3..];
                &rest[rest.find('/')?..]
            }
            None => input,
        };
        let path = path.split(['?', '#']).next().unwrap_or_default();

        let mut segments = path.trim_matches('/').split('/');
        let link = match (segments.next(), segments.next(), segments.next()) {
            (Some("confession"), Some(id), None) if !id.is_empty() => {
                Permalink::Confession(id.to_string())
            }
            (Some("reply"), Some(id), None) if !id.is_empty() => Permalink::Reply(id.to_string()),
            _ => return None,
        };

        Some(link)
    }
}

impl fmt::Display for Permalink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permalink::Confession(id) => write!(f, "/confession/{}", id),
            Permalink::Reply(id) => write!(f, "/reply/{}", id),
        }
    }
}
