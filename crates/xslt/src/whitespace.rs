//! Whitespace policy: `xsl:strip-space` / `xsl:preserve-space` lists and
//! the value-level transformations they select.
//!
//! Element lookup goes exact `{ns}local`, then `{ns}*`, then `*`. The
//! fallback policy is `strip` for attribute-context values and `normalize`
//! for text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacePolicy {
    Strip,
    Preserve,
    Normalize,
}

#[derive(Debug, Clone, Default)]
pub struct WhitespaceLists {
    strip: Vec<String>,
    preserve: Vec<String>,
}

/// Canonical whitespace-list entry for an element name: `{ns}local`,
/// `{ns}*`, plain `local`, or `*`.
pub fn canonical_name(namespace: Option<&str>, local: &str) -> String {
    match namespace {
        Some(ns) => format!("{{{}}}{}", ns, local),
        None => local.to_string(),
    }
}

impl WhitespaceLists {
    pub fn add_strip(&mut self, canonical: String) {
        self.strip.push(canonical);
    }

    pub fn add_preserve(&mut self, canonical: String) {
        self.preserve.push(canonical);
    }

    /// Policy for text under the element `{namespace}local`.
    pub fn policy_for(&self, namespace: Option<&str>, local: &str) -> SpacePolicy {
        let exact = canonical_name(namespace, local);
        let ns_wildcard = canonical_name(namespace, "*");
        for candidate in [exact.as_str(), ns_wildcard.as_str(), "*"] {
            if self.strip.iter().any(|s| s == candidate) {
                return SpacePolicy::Strip;
            }
            if self.preserve.iter().any(|s| s == candidate) {
                return SpacePolicy::Preserve;
            }
        }
        SpacePolicy::Normalize
    }
}

pub fn apply(policy: SpacePolicy, value: &str) -> String {
    match policy {
        SpacePolicy::Preserve => value.to_string(),
        SpacePolicy::Strip => collapse(value.trim()),
        SpacePolicy::Normalize => collapse(value),
    }
}

/// Processes a value the way emission sites do: attribute values (no
/// context element) strip; text consults the element's policy.
pub fn process_value(
    lists: &WhitespaceLists,
    value: &str,
    context_element: Option<(Option<&str>, &str)>,
) -> String {
    let policy = match context_element {
        None => SpacePolicy::Strip,
        Some((ns, local)) => lists.policy_for(ns, local),
    };
    apply(policy, value)
}

/// Collapses every whitespace run into a single space without trimming.
fn collapse(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_run = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_trims_and_collapses() {
        assert_eq!(apply(SpacePolicy::Strip, "  a \n b  "), "a b");
    }

    #[test]
    fn normalize_collapses_without_trimming() {
        assert_eq!(apply(SpacePolicy::Normalize, " a \n\t b "), " a b ");
    }

    #[test]
    fn preserve_is_identity() {
        assert_eq!(apply(SpacePolicy::Preserve, " a \n b "), " a \n b ");
    }

    #[test]
    fn lookup_precedence() {
        let mut lists = WhitespaceLists::default();
        lists.add_strip("{urn:x}poem".to_string());
        lists.add_preserve("{urn:x}*".to_string());
        lists.add_strip("*".to_string());

        assert_eq!(
            lists.policy_for(Some("urn:x"), "poem"),
            SpacePolicy::Strip
        );
        // The {ns}* preserve entry shadows the global strip.
        assert_eq!(
            lists.policy_for(Some("urn:x"), "verse"),
            SpacePolicy::Preserve
        );
        assert_eq!(lists.policy_for(None, "other"), SpacePolicy::Strip);
    }

    #[test]
    fn default_policies() {
        let lists = WhitespaceLists::default();
        assert_eq!(process_value(&lists, "  a  b ", None), "a b");
        assert_eq!(
            process_value(&lists, "  a  b ", Some((None, "e"))),
            " a b "
        );
    }
}
