/// Field keys: immutable column paths through lookups
///
/// A key is an ordered list of segments. `Groups/Owner/Email` names the `Email`
/// column of the table reached through the `Owner` lookup of the table reached
/// through the `Groups` lookup of the root table.
///
/// The canonical string form joins segments with `/`. Characters that would be
/// ambiguous inside a segment are escaped:
///
/// | char | escape |
/// |------|--------|
/// | `$`  | `$D`   |
/// | `/`  | `$S`   |
/// | `&`  | `$A`   |
/// | `}`  | `$B`   |
/// | `~`  | `$T`   |
/// | `,`  | `$C`   |
///
/// Equality, hashing and ordering ignore ASCII case.
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const ESCAPES: [(char, char); 6] = [
    ('$', 'D'),
    ('/', 'S'),
    ('&', 'A'),
    ('}', 'B'),
    ('~', 'T'),
    (',', 'C'),
];

#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldKey {
    parts: Vec<String>,
}

impl FieldKey {
    /// Create a key for `name` under an optional parent
    pub fn new(parent: Option<&FieldKey>, name: impl Into<String>) -> Self {
        let mut parts = parent.map(|p| p.parts.clone()).unwrap_or_default();
        parts.push(name.into());
        FieldKey { parts }
    }

    /// Root-level key for a single column name
    pub fn from_name(name: impl Into<String>) -> Self {
        FieldKey::new(None, name)
    }

    /// Build a key from already-decoded segments. Returns `None` for an empty list.
    pub fn from_parts<I, S>(parts: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.is_empty() {
            None
        } else {
            Some(FieldKey { parts })
        }
    }

    /// Parse the canonical `/`-separated form
    pub fn from_string(s: &str) -> Self {
        FieldKey {
            parts: s.split('/').map(decode_part).collect(),
        }
    }

    pub fn name(&self) -> &str {
        // parts is never empty
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn parent(&self) -> Option<FieldKey> {
        if self.parts.len() > 1 {
            Some(FieldKey {
                parts: self.parts[..self.parts.len() - 1].to_vec(),
            })
        } else {
            None
        }
    }

    pub fn root(&self) -> FieldKey {
        FieldKey {
            parts: vec![self.parts[0].clone()],
        }
    }

    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    pub fn child(&self, name: impl Into<String>) -> FieldKey {
        FieldKey::new(Some(self), name)
    }

    /// Re-root this key underneath `parent`
    pub fn rebase(&self, parent: &FieldKey) -> FieldKey {
        let mut parts = parent.parts.clone();
        parts.extend(self.parts.iter().cloned());
        FieldKey { parts }
    }

    /// True if `self` equals `other` or is one of its ancestors
    pub fn is_prefix_of(&self, other: &FieldKey) -> bool {
        self.parts.len() <= other.parts.len()
            && self
                .parts
                .iter()
                .zip(other.parts.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Dotted form used in expressions and messages: `Groups.Owner.Email`
    pub fn to_display_string(&self) -> String {
        self.parts.join(".")
    }

    fn normalized(&self) -> impl Iterator<Item = String> + '_ {
        self.parts.iter().map(|p| p.to_ascii_lowercase())
    }
}

fn encode_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for ch in part.chars() {
        match ESCAPES.iter().find(|(c, _)| *c == ch) {
            Some((_, code)) => {
                out.push('$');
                out.push(*code);
            }
            None => out.push(ch),
        }
    }
    out
}

fn decode_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut chars = part.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars
            .peek()
            .and_then(|next| ESCAPES.iter().find(|(_, code)| code == next))
        {
            Some((decoded, _)) => {
                out.push(*decoded);
                chars.next();
            }
            // Unknown escape: keep it literally
            None => out.push('$'),
        }
    }
    out
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded: Vec<String> = self.parts.iter().map(|p| encode_part(p)).collect();
        write!(f, "{}", encoded.join("/"))
    }
}

impl fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldKey({})", self)
    }
}

impl FromStr for FieldKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FieldKey::from_string(s))
    }
}

impl From<String> for FieldKey {
    fn from(s: String) -> Self {
        FieldKey::from_string(&s)
    }
}

impl From<&str> for FieldKey {
    fn from(s: &str) -> Self {
        FieldKey::from_string(s)
    }
}

impl From<FieldKey> for String {
    fn from(key: FieldKey) -> Self {
        key.to_string()
    }
}

impl PartialEq for FieldKey {
    fn eq(&self, other: &Self) -> bool {
        self.parts.len() == other.parts.len()
            && self
                .parts
                .iter()
                .zip(other.parts.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for FieldKey {}

impl Hash for FieldKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.len().hash(state);
        for part in self.normalized() {
            part.hash(state);
        }
    }
}

impl PartialOrd for FieldKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized().cmp(other.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_simple_path() {
        let key = FieldKey::from_string("Groups/Owner/Email");
        assert_eq!(key.parts(), &["Groups", "Owner", "Email"]);
        assert_eq!(key.name(), "Email");
        assert_eq!(key.depth(), 3);
        assert_eq!(key.parent(), Some(FieldKey::from_string("Groups/Owner")));
        assert_eq!(key.root(), FieldKey::from_name("Groups"));
    }

    #[test]
    fn test_escaped_segment_round_trip() {
        let key = FieldKey::from_parts(["a/b", "c$d", "e~f,g&h}"]).unwrap();
        let text = key.to_string();
        assert_eq!(text, "a$Sb/c$Dd/e$Tf$Cg$Ah$B");
        let parsed = FieldKey::from_string(&text);
        assert_eq!(parsed.parts(), key.parts());
    }

    #[test]
    fn test_unknown_escape_is_literal() {
        let key = FieldKey::from_string("cost$X");
        assert_eq!(key.name(), "cost$X");
    }

    #[test]
    fn test_case_insensitive_equality_and_hash() {
        let mut set = HashSet::new();
        set.insert(FieldKey::from_string("Groups/Name"));
        assert!(set.contains(&FieldKey::from_string("groups/NAME")));
        assert_eq!(
            FieldKey::from_string("A/b").cmp(&FieldKey::from_string("a/B")),
            Ordering::Equal
        );
    }

    #[test]
    fn test_rebase_and_child() {
        let parent = FieldKey::from_name("Groups");
        let rebased = FieldKey::from_string("Owner/Email").rebase(&parent);
        assert_eq!(rebased, FieldKey::from_string("Groups/Owner/Email"));
        assert_eq!(parent.child("Name"), FieldKey::from_string("Groups/Name"));
        assert!(parent.is_prefix_of(&rebased));
        assert!(!rebased.is_prefix_of(&parent));
    }

    #[test]
    fn test_display_string_uses_dots() {
        let key = FieldKey::from_string("Groups/Name");
        assert_eq!(key.to_display_string(), "Groups.Name");
    }

    #[test]
    fn test_empty_parts_rejected() {
        assert!(FieldKey::from_parts(Vec::<String>::new()).is_none());
    }

    #[test]
    fn test_blank_leaf_is_kept() {
        let key = FieldKey::from_string("Groups/");
        assert_eq!(key.depth(), 2);
        assert_eq!(key.name(), "");
    }

    #[test]
    fn test_serde_as_string() {
        let key: FieldKey = serde_yaml::from_str("Groups/Name").unwrap();
        assert_eq!(key, FieldKey::from_string("Groups/Name"));
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"Groups/Name\"");
    }
}
