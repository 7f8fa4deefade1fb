use crate::errors::RegistryError;

/// One dot-separated segment of a match identifier (§4.1 grammar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSegment {
    /// A literal key, anchored `^key$` at this level.
    Literal(String),
    /// `*` - matches any key at this level, compiled to `^.*$`.
    Wildcard,
    /// `*<tag1,tag2>` - matches any key whose value is a registry with a tag set
    /// that is a superset of the listed tags.
    TaggedWildcard(Vec<String>),
}

impl MatchSegment {
    /// Whether this segment matches the given key (for `Literal`/`Wildcard`, the key
    /// alone decides; `TaggedWildcard` additionally requires the caller to check tags
    /// against the matched value).
    pub fn matches_key(&self, key: &str) -> bool {
        match self {
            MatchSegment::Literal(l) => l == key,
            MatchSegment::Wildcard | MatchSegment::TaggedWildcard(_) => true,
        }
    }

    pub fn is_unrestricted_wildcard(&self) -> bool {
        matches!(self, MatchSegment::Wildcard)
    }
}

/// Parse a dot-separated match identifier into its segments.
///
/// Rejects malformed tag predicates: unclosed `<...>`, or `>` appearing before a
/// matching `<` (stray brackets outside the `*<...>` form).
pub fn parse_match_identifier(identifier: &str) -> Result<Vec<MatchSegment>, RegistryError> {
    if identifier.is_empty() {
        return Err(RegistryError::MalformedMatchIdentifier {
            identifier: identifier.to_string(),
            reason: "empty identifier",
        });
    }

    identifier
        .split('.')
        .map(|segment| parse_segment(identifier, segment))
        .collect()
}

fn parse_segment(identifier: &str, segment: &str) -> Result<MatchSegment, RegistryError> {
    if segment.is_empty() {
        return Err(RegistryError::MalformedMatchIdentifier {
            identifier: identifier.to_string(),
            reason: "empty segment",
        });
    }

    if segment == "*" {
        return Ok(MatchSegment::Wildcard);
    }

    if let Some(inner) = segment.strip_prefix("*<") {
        let Some(tags) = inner.strip_suffix('>') else {
            return Err(RegistryError::MalformedMatchIdentifier {
                identifier: identifier.to_string(),
                reason: "unclosed tag predicate",
            });
        };
        if tags.contains('<') || tags.contains('>') {
            return Err(RegistryError::MalformedMatchIdentifier {
                identifier: identifier.to_string(),
                reason: "nested tag predicate",
            });
        }
        let tags = tags.split(',').map(|t| t.trim().to_string()).collect();
        return Ok(MatchSegment::TaggedWildcard(tags));
    }

    if segment.contains('<') || segment.contains('>') {
        return Err(RegistryError::MalformedMatchIdentifier {
            identifier: identifier.to_string(),
            reason: "stray tag-predicate bracket outside '*<...>' form",
        });
    }

    Ok(MatchSegment::Literal(segment.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestCase {
        name: &'static str,
        input: &'static str,
        expected: Result<Vec<MatchSegment>, ()>,
    }

    #[test]
    fn parse_match_identifier_table_driven() {
        let cases = vec![
            TestCase {
                name: "plain literal path",
                input: "network.layers.weights",
                expected: Ok(vec![
                    MatchSegment::Literal("network".into()),
                    MatchSegment::Literal("layers".into()),
                    MatchSegment::Literal("weights".into()),
                ]),
            },
            TestCase {
                name: "bare wildcard",
                input: "layers.*.bias",
                expected: Ok(vec![
                    MatchSegment::Literal("layers".into()),
                    MatchSegment::Wildcard,
                    MatchSegment::Literal("bias".into()),
                ]),
            },
            TestCase {
                name: "single tag predicate",
                input: "a.*<shared>.b",
                expected: Ok(vec![
                    MatchSegment::Literal("a".into()),
                    MatchSegment::TaggedWildcard(vec!["shared".into()]),
                    MatchSegment::Literal("b".into()),
                ]),
            },
            TestCase {
                name: "multi tag predicate",
                input: "a.*<x,y>.b",
                expected: Ok(vec![
                    MatchSegment::Literal("a".into()),
                    MatchSegment::TaggedWildcard(vec!["x".into(), "y".into()]),
                    MatchSegment::Literal("b".into()),
                ]),
            },
            TestCase {
                name: "unclosed predicate is rejected",
                input: "a.*<tag.b",
                expected: Err(()),
            },
            TestCase {
                name: "stray closing bracket is rejected",
                input: "a.tag>.b",
                expected: Err(()),
            },
            TestCase {
                name: "empty identifier is rejected",
                input: "",
                expected: Err(()),
            },
        ];

        for case in cases {
            let actual = parse_match_identifier(case.input);
            match case.expected {
                Ok(expected) => assert_eq!(
                    actual.expect("expected Ok"),
                    expected,
                    "case '{}' failed",
                    case.name
                ),
                Err(()) => assert!(actual.is_err(), "case '{}' should have failed", case.name),
            }
        }
    }
}
