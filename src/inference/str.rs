use std::collections::BTreeSet;

#[derive(Clone, Debug, Default)]
pub struct StrC {
    pub lits: BTreeSet<String>,
    pub is_uri: bool,
    pub saw_empty: bool,
    /// Literal set was capped; no enumeration or synthesized pattern.
    pub overflow: bool,
}

// ------- Regex synthesis policy (grex integration) -------

/// Minimum distinct literals before we even consider synthesizing a regex.
const GREX_MIN_SAMPLES: usize = 3;

/// Hard cap on the length of a generated regex. If grex exceeds this,
/// we treat the field as an arbitrary string (no pattern).
const GREX_MAX_PATTERN_LEN: usize = 512;

/// Coarse top-level `|` count threshold.
const GREX_MAX_ALTS: usize = 64;

impl StrC {
    pub fn observe(s: &str) -> Self {
        Self {
            lits: if s.is_empty() { BTreeSet::new() } else { BTreeSet::from([s.to_owned()]) },
            is_uri: looks_like_uri(s),
            saw_empty: s.is_empty(),
            overflow: false,
        }
    }

    pub(super) fn join(a: &Self, b: &Self) -> Self {
        let mut out = Self {
            lits: &a.lits | &b.lits,
            is_uri: a.is_uri && b.is_uri,
            saw_empty: a.saw_empty || b.saw_empty,
            overflow: a.overflow || b.overflow,
        };
        if out.lits.len() > super::MAX_STR_LITS {
            out.lits.clear();
            out.overflow = true;
        }
        out
    }

    /// Pattern for the observed strings: a tiny human enum becomes an
    /// alternation, anything else goes through grex. URIs get none.
    pub fn pattern(&self) -> Option<String> {
        if self.is_uri || self.overflow || self.lits.is_empty() {
            return None;
        }
        let tiny = self.lits.len() <= super::STRING_ENUM_MAX && self.lits.iter().all(|s| looks_humanish(s));
        if tiny {
            let alts: Vec<String> = self.lits.iter().map(|s| regex::escape(s)).collect();
            return Some(alts.join("|"));
        }
        synth_regex_with_grex(&self.lits)
    }
}

fn too_many_alternations(rx: &str) -> bool {
    rx.as_bytes().iter().filter(|&&b| b == b'|').count() > GREX_MAX_ALTS
}

/// Anchored regex over the full literal set, or `None` when the set is too
/// small or the result too unwieldy.
pub fn synth_regex_with_grex(samples: &BTreeSet<String>) -> Option<String> {
    use grex::RegExpBuilder;

    let mut lits: Vec<&str> = samples
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if lits.len() < GREX_MIN_SAMPLES {
        return None;
    }
    lits.sort_unstable();

    // grex 1.4.5: build() returns `^...$`.
    let rx = RegExpBuilder::from(&lits).build();
    if rx.len() > GREX_MAX_PATTERN_LEN || too_many_alternations(&rx) {
        return None;
    }
    Some(rx)
}

pub fn looks_like_uri(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
        || s.starts_with("mailto:") || s.starts_with("tel:")
}

pub fn looks_humanish(s: &str) -> bool {
    s.len() <= super::STRING_ENUM_MAX_LEN &&
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-' || c == '_')
}
