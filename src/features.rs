//! FEAT feature discovery and storage (RFC 2389 §3)
//!
//! The FEAT reply lists one extension per line between the opening and
//! terminating lines. Tokens keep their server-reported order; lookups are
//! case-insensitive.

/// Features advertised by an FTP server
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct Features {
    /// Ordered `(NAME, optional parameter)` pairs, names uppercased
    entries: Vec<(String, Option<String>)>,
    /// False when the server rejected FEAT (500/502)
    known: bool,
}

impl Features {
    /// Feature set for a server that rejected FEAT
    pub fn unknown() -> Self {
        Self {
            entries: Vec::new(),
            known: false,
        }
    }

    /// Parse the body of a 211 FEAT reply
    ///
    /// The first and last lines ("Features:" / "End") are skipped; each
    /// remaining line is trimmed and split into a token and an optional
    /// parameter.
    ///
    /// # Example
    /// ```text
    /// Features:
    ///  MLST type*;size*;modify*;
    ///  EPSV
    ///  UTF8
    /// End
    /// ```
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let body = if lines.len() >= 2 {
            &lines[1..lines.len() - 1]
        } else {
            &[][..]
        };

        let mut features = Self {
            entries: Vec::new(),
            known: true,
        };
        for line in body {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once(' ') {
                Some((name, param)) => features.set(name, Some(param.trim().to_string())),
                None => features.set(line, None),
            }
        }
        features
    }

    /// Whether the server answered FEAT at all
    pub fn is_known(&self) -> bool {
        self.known
    }

    /// Check if a feature is advertised
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Parameter string for a feature, if advertised with one
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, p)| p.as_deref())
    }

    /// Facts listed by the MLST feature, `*` markers stripped
    pub fn mlst_facts(&self) -> Vec<String> {
        self.param("MLST")
            .map(|p| {
                p.split(';')
                    .map(|f| f.trim_end_matches('*').trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All advertised tokens in server order
    pub fn list(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Add a feature or replace its parameter
    pub fn set(&mut self, name: &str, param: Option<String>) {
        let name_upper = name.to_uppercase();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name_upper))
        {
            entry.1 = param;
        } else {
            self.entries.push((name_upper, param));
        }
    }

    /// Remove a feature
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Apply configured overrides after discovery
    pub fn apply_overrides(&mut self, overrides: &[(String, crate::config::FeatOverride)]) {
        use crate::config::FeatOverride;

        for (name, action) in overrides {
            match action {
                FeatOverride::Enable => {
                    if !self.has(name) {
                        self.set(name, None);
                    }
                }
                FeatOverride::Disable => self.remove(name),
                FeatOverride::Param(p) => self.set(name, Some(p.clone())),
            }
        }
    }
}
