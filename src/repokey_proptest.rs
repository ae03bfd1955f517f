//! Property-based tests for repository key derivation.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::repokey::{parse_remote, sanitize_segment, short_hash_n};
    use proptest::prelude::*;

    proptest! {
        /// Property: sanitized segments only contain filesystem-safe characters
        #[test]
        fn sanitize_segment_output_is_safe(input in ".*") {
            let result = sanitize_segment(&input);
            prop_assert!(
                result.chars().all(|c| c.is_ascii_alphanumeric()
                    || c == '.' || c == '_' || c == '-'),
                "sanitize_segment produced unsafe output '{}' from '{}'",
                result,
                input
            );
        }

        /// Property: sanitized segments are never empty and never dot-prefixed
        #[test]
        fn sanitize_segment_never_empty_or_hidden(input in ".*") {
            let result = sanitize_segment(&input);
            prop_assert!(!result.is_empty());
            prop_assert!(!result.starts_with('.'));
        }

        /// Property: sanitization is idempotent
        #[test]
        fn sanitize_segment_is_idempotent(input in ".*") {
            let once = sanitize_segment(&input);
            prop_assert_eq!(sanitize_segment(&once), once);
        }

        /// Property: short_hash_n returns exactly min(max(n, 8 if n<=0), 64)
        /// lowercase hex characters
        #[test]
        fn short_hash_n_length_and_alphabet(input in ".*", n in -10i64..100) {
            let result = short_hash_n(&input, n);
            let expected = if n <= 0 { 8 } else { n.min(64) as usize };
            prop_assert_eq!(result.len(), expected);
            prop_assert!(result.chars().all(|c| c.is_ascii_hexdigit()
                && !c.is_ascii_uppercase()));
        }

        /// Property: hash prefixes nest (the n-char hash is a prefix of the
        /// 64-char hash)
        #[test]
        fn short_hash_n_is_prefix_of_full(input in ".*", n in 1i64..64) {
            let full = short_hash_n(&input, 64);
            let short = short_hash_n(&input, n);
            prop_assert!(full.starts_with(&short));
        }

        /// Property: parse_remote is indifferent to a `.git` suffix
        #[test]
        fn parse_remote_ignores_git_suffix(
            host in "[a-z][a-z0-9.]{1,20}",
            owner in "[a-zA-Z0-9_-]{1,16}",
            repo in "[a-zA-Z0-9_-]{1,16}",
        ) {
            let plain = parse_remote(&format!("https://{host}/{owner}/{repo}"));
            let suffixed = parse_remote(&format!("https://{host}/{owner}/{repo}.git"));
            prop_assert_eq!(plain, suffixed);
        }
    }
}
