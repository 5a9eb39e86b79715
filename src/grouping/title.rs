use regex::Regex;

/// A numeric sequence token extracted from a single title, plus the residual
/// text around it. Whether the hint actually marks a series is decided by the
/// grouper, which compares hints across an author's titles.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceHint {
    pub prefix: String,
    pub index: f64,
}

pub struct TitleNormalizer {
    catalog_suffix: Regex,
    trailing_number: Regex,
    leading_number: Regex,
}

impl TitleNormalizer {
    pub fn new() -> Self {
        Self {
            // Calibre appends "(84)"-style suffixes to force unique folder
            // names. Only a fully numeric parenthetical at the string end
            // qualifies; "(Unabridged)" is part of the title.
            catalog_suffix: Regex::new(r"\s*\(\d+\)\s*$").unwrap(),
            trailing_number: Regex::new(r"^(?P<prefix>.*?[^\s#:,\-])[\s#:,\-]+(?P<num>\d+(?:\.\d+)?)$").unwrap(),
            leading_number: Regex::new(r"^(?P<num>\d+(?:\.\d+)?)[\s.:\-]+(?P<prefix>\S.*)$").unwrap(),
        }
    }

    /// Remove the catalog-generated disambiguation suffix, if any. Only the
    /// final trailing numeric group is stripped; an emptied title falls back
    /// to the original.
    pub fn clean(&self, raw_title: &str) -> String {
        let cleaned = self.catalog_suffix.replace(raw_title, "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            raw_title.trim().to_string()
        } else {
            cleaned.to_string()
        }
    }

    /// Extract an implicit sequence number from a cleaned title, e.g.
    /// "Foundation 2" or "2. Foundation". Returns None when no standalone
    /// numeric token sits at either end of the title.
    pub fn sequence_hint(&self, clean_title: &str) -> Option<SequenceHint> {
        let title = clean_title.trim();
        for re in [&self.trailing_number, &self.leading_number] {
            if let Some(caps) = re.captures(title) {
                let prefix = caps["prefix"].trim().to_string();
                let index: f64 = match caps["num"].parse() {
                    Ok(n) => n,
                    Err(_) => continue,
                };
                if !prefix.is_empty() {
                    return Some(SequenceHint { prefix, index });
                }
            }
        }
        None
    }
}

impl Default for TitleNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
