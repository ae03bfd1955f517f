//! Embedded git hook scripts.
//!
//! `devback setup` installs these under `<commonGitDir>/hooks`. They are
//! deliberately tiny wrappers: all logic (debounce, rebase detection,
//! enablement checks) lives in `devback hook …`, and every script ends in
//! `|| true` plus `exit 0` so a broken or missing devback binary can never
//! block a git operation.

/// Names of the hooks devback installs.
pub const HOOK_NAMES: [&str; 3] = ["post-commit", "post-merge", "post-rewrite"];

/// Marker line identifying a devback-installed hook script.
pub const HOOK_MARKER: &str = "# installed by devback setup";

const POST_COMMIT: &str = "#!/bin/sh\n\
# installed by devback setup\n\
devback hook post-commit >/dev/null 2>&1 || true\n\
exit 0\n";

const POST_MERGE: &str = "#!/bin/sh\n\
# installed by devback setup\n\
devback hook post-merge >/dev/null 2>&1 || true\n\
exit 0\n";

const POST_REWRITE: &str = "#!/bin/sh\n\
# installed by devback setup\n\
devback hook post-rewrite \"$1\" >/dev/null 2>&1 || true\n\
exit 0\n";

/// Returns the script for a hook name, or `None` for hooks devback does not
/// manage.
pub fn hook_script(name: &str) -> Option<&'static str> {
    match name {
        "post-commit" => Some(POST_COMMIT),
        "post-merge" => Some(POST_MERGE),
        "post-rewrite" => Some(POST_REWRITE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_hook_has_a_script() {
        for name in HOOK_NAMES {
            let script = hook_script(name).unwrap();
            assert!(script.starts_with("#!/bin/sh\n"));
            assert!(script.contains(HOOK_MARKER));
            assert!(script.contains(&format!("devback hook {}", name)));
            assert!(script.ends_with("exit 0\n"));
        }
        assert!(hook_script("pre-push").is_none());
    }

    #[test]
    fn test_post_rewrite_forwards_command() {
        assert!(hook_script("post-rewrite").unwrap().contains("\"$1\""));
    }
}
