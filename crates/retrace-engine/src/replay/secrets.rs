//! `<secret>KEY</secret>` placeholders in typed text.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

static SECRET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<secret>(.*?)</secret>").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown secret '{key}'")]
pub struct UnknownSecret {
    pub key: String,
}

/// Text ready to be typed. Never log `text` when `contains_secret` is set.
#[derive(Clone, PartialEq, Eq)]
pub struct Substituted {
    pub text: String,
    pub contains_secret: bool,
}

impl std::fmt::Debug for Substituted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = if self.contains_secret {
            "<redacted>"
        } else {
            self.text.as_str()
        };
        f.debug_struct("Substituted")
            .field("text", &text)
            .field("contains_secret", &self.contains_secret)
            .finish()
    }
}

pub fn substitute(
    text: &str,
    secrets: &BTreeMap<String, String>,
) -> Result<Substituted, UnknownSecret> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut contains_secret = false;

    for caps in SECRET_RE.captures_iter(text) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let key = key.as_str().trim();
        let value = secrets.get(key).ok_or_else(|| UnknownSecret {
            key: key.to_string(),
        })?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
        contains_secret = true;
    }
    out.push_str(&text[last..]);

    Ok(Substituted {
        text: out,
        contains_secret,
    })
}
