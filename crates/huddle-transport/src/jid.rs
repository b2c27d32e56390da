//! Canonical-JID normalization (spec.md §4.2).
//!
//! Some transports present the same chat under two identifiers — most
//! commonly a self-chat seen both as the account's own JID and as a
//! `@lid`/alternate form. `JidMap` remembers the mapping the first time an
//! alternate form is observed and rewrites every subsequent inbound
//! identifier to the canonical one, so the rest of the system only ever
//! sees one `jid` per chat.

use dashmap::DashMap;

#[derive(Default)]
pub struct JidMap {
    aliases: DashMap<String, String>,
}

impl JidMap {
    pub fn new() -> Self {
        Self {
            aliases: DashMap::new(),
        }
    }

    /// Record that `alternate` refers to the same chat as `canonical`.
    pub fn alias(&self, alternate: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.insert(alternate.into(), canonical.into());
    }

    /// Rewrite `jid` to its canonical form, or return it unchanged if no
    /// alias is registered.
    pub fn normalize(&self, jid: &str) -> String {
        self.aliases
            .get(jid)
            .map(|canonical| canonical.clone())
            .unwrap_or_else(|| jid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rewrites_known_alias() {
        let map = JidMap::new();
        map.alias("123@lid", "123@s.whatsapp.net");
        assert_eq!(map.normalize("123@lid"), "123@s.whatsapp.net");
    }

    #[test]
    fn normalize_passes_through_unknown_jid() {
        let map = JidMap::new();
        assert_eq!(map.normalize("456@s.whatsapp.net"), "456@s.whatsapp.net");
    }
}
