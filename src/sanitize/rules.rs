use regex::Regex;

use super::{EntityType, Mapping, SanitizeError, SanitizeResult, Sanitizer};

/// A detection rule: regex, the entity type it tags, and a fixed confidence.
pub struct DetectionRule {
    pub entity_type: EntityType,
    pub regex: Regex,
    pub confidence: f64,
}

/// Regex-based sanitizer with longest-match overlap resolution.
///
/// All rules run over the full input; overlapping matches are resolved by
/// preferring the longest match, ties broken by earliest start offset. The
/// SSN pattern is a proper subset of the phone pattern's first seven digits,
/// so longest-match ordering keeps a 10-digit phone from being tagged as an
/// SSN.
pub struct RegexSanitizer {
    rules: Vec<DetectionRule>,
}

#[derive(Debug)]
struct RawMatch<'a> {
    start: usize,
    end: usize,
    value: &'a str,
    entity_type: EntityType,
    confidence: f64,
}

impl RegexSanitizer {
    /// Built-in detection rules: email, US phone, SSN, each at 0.99.
    pub fn new() -> Self {
        let rules = vec![
            DetectionRule {
                entity_type: EntityType::Email,
                regex: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
                    .expect("email pattern is valid"),
                confidence: 0.99,
            },
            DetectionRule {
                entity_type: EntityType::Phone,
                regex: Regex::new(r"\b\d{3}-\d{3}-\d{4}\b").expect("phone pattern is valid"),
                confidence: 0.99,
            },
            DetectionRule {
                entity_type: EntityType::Ssn,
                regex: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern is valid"),
                confidence: 0.99,
            },
        ];
        Self { rules }
    }

    /// Build a sanitizer from a custom rule set.
    pub fn with_rules(rules: Vec<DetectionRule>) -> Self {
        Self { rules }
    }
}

impl Default for RegexSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer for RegexSanitizer {
    fn sanitize(&self, input: &str) -> Result<SanitizeResult, SanitizeError> {
        let mut matches: Vec<RawMatch<'_>> = Vec::new();
        for rule in &self.rules {
            for m in rule.regex.find_iter(input) {
                matches.push(RawMatch {
                    start: m.start(),
                    end: m.end(),
                    value: m.as_str(),
                    entity_type: rule.entity_type,
                    confidence: rule.confidence,
                });
            }
        }

        if matches.is_empty() {
            return Ok(SanitizeResult {
                sanitized: input.to_string(),
                mappings: Vec::new(),
            });
        }

        // Longest match first, then earliest start; stable so rule order
        // breaks any remaining ties.
        matches.sort_by(|a, b| {
            let len_a = a.end - a.start;
            let len_b = b.end - b.start;
            len_b.cmp(&len_a).then(a.start.cmp(&b.start))
        });

        let mut occupied = vec![false; input.len()];
        let mut accepted: Vec<RawMatch<'_>> = Vec::with_capacity(matches.len());
        for m in matches {
            if occupied[m.start..m.end].iter().any(|taken| *taken) {
                continue;
            }
            for slot in &mut occupied[m.start..m.end] {
                *slot = true;
            }
            accepted.push(m);
        }

        accepted.sort_by_key(|m| m.start);

        // Per entity type, a counter plus a value-to-surrogate table keeps
        // repeated values on the same surrogate within this call.
        let mut counters: std::collections::HashMap<EntityType, usize> =
            std::collections::HashMap::new();
        let mut surrogates: std::collections::HashMap<(EntityType, &str), String> =
            std::collections::HashMap::new();

        let mut output = String::with_capacity(input.len());
        let mut mappings = Vec::with_capacity(accepted.len());
        let mut cursor = 0usize;

        for m in &accepted {
            if cursor > m.start {
                return Err(SanitizeError::OverlapResolution { cursor });
            }

            let surrogate = surrogates
                .entry((m.entity_type, m.value))
                .or_insert_with(|| {
                    let counter = counters.entry(m.entity_type).or_insert(0);
                    *counter += 1;
                    m.entity_type.surrogate(*counter)
                })
                .clone();

            output.push_str(&input[cursor..m.start]);
            output.push_str(&surrogate);
            cursor = m.end;

            mappings.push(Mapping {
                placeholder: surrogate,
                original_value: m.value.to_string(),
                entity_type: m.entity_type,
                confidence: m.confidence,
            });
        }
        output.push_str(&input[cursor..]);

        Ok(SanitizeResult {
            sanitized: output,
            mappings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(input: &str) -> SanitizeResult {
        RegexSanitizer::new().sanitize(input).unwrap()
    }

    #[test]
    fn clean_text_passes_through_unchanged() {
        let result = sanitize("hello world");
        assert_eq!(result.sanitized, "hello world");
        assert!(result.mappings.is_empty());
    }

    #[test]
    fn detects_and_replaces_email() {
        let result = sanitize("contact alice@example.com today");
        assert_eq!(result.sanitized, "contact person1@example.net today");
        assert_eq!(result.mappings.len(), 1);
        assert_eq!(result.mappings[0].entity_type, EntityType::Email);
        assert_eq!(result.mappings[0].original_value, "alice@example.com");
        assert_eq!(result.mappings[0].confidence, 0.99);
    }

    #[test]
    fn assigns_indices_left_to_right() {
        let result =
            sanitize("Email alice@example.com and bob@example.com call 555-123-4567");
        assert_eq!(
            result.sanitized,
            "Email person1@example.net and person2@example.net call 555-010-0001"
        );
        assert_eq!(result.mappings.len(), 3);
    }

    #[test]
    fn repeated_value_reuses_surrogate() {
        let result = sanitize("alice@example.com wrote to alice@example.com");
        assert_eq!(
            result.sanitized,
            "person1@example.net wrote to person1@example.net"
        );
        assert_eq!(result.mappings.len(), 2);
        assert_eq!(result.mappings[0].placeholder, result.mappings[1].placeholder);
    }

    #[test]
    fn phone_wins_over_ssn_prefix() {
        // The SSN pattern matches the leading digits of a phone number; the
        // longer phone match must claim the span.
        let result = sanitize("call 555-123-4567");
        assert_eq!(result.sanitized, "call 555-010-0001");
        assert_eq!(result.mappings.len(), 1);
        assert_eq!(result.mappings[0].entity_type, EntityType::Phone);
    }

    #[test]
    fn ssn_detected_standalone() {
        let result = sanitize("ssn 123-45-6789 on file");
        assert_eq!(result.sanitized, "ssn 900-00-0001 on file");
        assert_eq!(result.mappings[0].entity_type, EntityType::Ssn);
    }

    #[test]
    fn mixed_entities_get_independent_counters() {
        let result = sanitize("a@example.com b@example.com 555-123-4567 123-45-6789");
        assert_eq!(
            result.sanitized,
            "person1@example.net person2@example.net 555-010-0001 900-00-0001"
        );
        assert_eq!(result.mappings.len(), 4);
    }

    #[test]
    fn sanitize_is_deterministic() {
        let input = "alice@example.com 555-123-4567 bob@example.com 123-45-6789";
        let first = sanitize(input);
        let second = sanitize(input);
        assert_eq!(first.sanitized, second.sanitized);
        assert_eq!(first.mappings.len(), second.mappings.len());
        for (a, b) in first.mappings.iter().zip(second.mappings.iter()) {
            assert_eq!(a.placeholder, b.placeholder);
            assert_eq!(a.original_value, b.original_value);
        }
    }

    #[test]
    fn sanitized_output_contains_no_original_values() {
        let input = "reach alice@example.com or 555-123-4567 or 123-45-6789";
        let result = sanitize(input);
        for mapping in &result.mappings {
            assert!(
                !result.sanitized.contains(&mapping.original_value),
                "sanitized text leaked {}",
                mapping.original_value
            );
        }
    }

    #[test]
    fn unicode_text_around_entities() {
        let result = sanitize("héllo wörld alice@example.com ✉");
        assert_eq!(result.sanitized, "héllo wörld person1@example.net ✉");
    }
}
