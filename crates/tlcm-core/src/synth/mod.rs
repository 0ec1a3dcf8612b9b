//! Launch configuration synthesis
//!
//! Turns a profile plus a base `KEY=value` document (the profile's previous
//! configuration or the shared template) into the document handed to the
//! ThinLinc client. Only the keys derived from the profile are touched;
//! every other line is carried over verbatim and in order.

use std::collections::HashMap;

use crate::profiles::{AuthType, ProfileRecord};

pub const LOGIN_NAME: &str = "LOGIN_NAME";
pub const SERVER_NAME: &str = "SERVER_NAME";
pub const AUTHENTICATION_METHOD: &str = "AUTHENTICATION_METHOD";
pub const PRIVATE_KEY: &str = "PRIVATE_KEY";

/// The keys a profile dictates, in the order they are appended when absent.
pub fn target_keys(profile: &ProfileRecord) -> Vec<(&'static str, String)> {
    let mut keys = vec![
        (LOGIN_NAME, single_line(&profile.username)),
        (SERVER_NAME, single_line(&profile.server)),
    ];

    match profile.auth_type {
        AuthType::SshKey => {
            keys.push((AUTHENTICATION_METHOD, "publickey".to_string()));
            keys.push((PRIVATE_KEY, single_line(&profile.auth_data)));
        }
        AuthType::Password => {
            keys.push((AUTHENTICATION_METHOD, "password".to_string()));
        }
    }

    keys
}

/// A value cut at its first line break. Validated profiles never carry one;
/// hand-edited documents might, and a value must not spill into a second line.
fn single_line(value: &str) -> String {
    match value.find(['\r', '\n']) {
        Some(end) => value[..end].to_string(),
        None => value.to_string(),
    }
}

/// Produce the final client configuration for `profile` from `base_text`.
///
/// Every line starting with `KEY=` for a target key is replaced by
/// `KEY=value`; target keys with no such line are appended at the end.
/// The result is deterministic and re-running it on its own output yields
/// the same text.
pub fn synthesize(profile: &ProfileRecord, base_text: &str) -> String {
    let targets = target_keys(profile);
    let values: HashMap<&str, &str> = targets
        .iter()
        .map(|(key, value)| (*key, value.as_str()))
        .collect();

    let eol = if base_text.contains("\r\n") || base_text.ends_with('\r') {
        "\r\n"
    } else {
        "\n"
    };

    let mut satisfied: Vec<&str> = Vec::with_capacity(targets.len());
    let mut out = String::with_capacity(base_text.len() + 128);

    for raw in base_text.split_inclusive('\n') {
        let (line, ending) = split_line_ending(raw);

        let replacement = line
            .split_once('=')
            .and_then(|(key, _)| values.get_key_value(key));

        match replacement {
            Some((key, value)) => {
                if !satisfied.contains(key) {
                    satisfied.push(*key);
                }
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push_str(ending);
            }
            None => out.push_str(raw),
        }
    }

    let trailing_newline = out.ends_with('\n');
    let mut appended = false;
    for (key, value) in &targets {
        if satisfied.contains(key) {
            continue;
        }
        if out.ends_with('\r') {
            out.push('\n');
        } else if !out.is_empty() && !out.ends_with('\n') {
            out.push_str(eol);
        }
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        appended = true;
    }

    if appended && trailing_newline {
        out.push_str(eol);
    }
    out
}

/// Split a line produced by `split_inclusive('\n')` into its content and its
/// terminator (`"\r\n"`, `"\n"`, a bare `"\r"` on an unterminated last line,
/// or nothing).
fn split_line_ending(raw: &str) -> (&str, &str) {
    if let Some(line) = raw.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw.strip_suffix('\n') {
        (line, "\n")
    } else if let Some(line) = raw.strip_suffix('\r') {
        (line, "\r")
    } else {
        (raw, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn password_profile() -> ProfileRecord {
        ProfileRecord::password("A", "s1", "u1")
    }

    fn key_profile() -> ProfileRecord {
        ProfileRecord::ssh_key("K", "hpc.example.com", "carol", "/home/carol/.ssh/id_ed25519", true)
    }

    #[test]
    fn test_empty_base_appends_all_keys() {
        assert_eq!(
            synthesize(&password_profile(), ""),
            "LOGIN_NAME=u1\nSERVER_NAME=s1\nAUTHENTICATION_METHOD=password"
        );
    }

    #[test]
    fn test_replaces_in_place_and_appends_missing() {
        let profile = ProfileRecord::password("A", "s", "new");
        assert_eq!(
            synthesize(&profile, "LOGIN_NAME=old\nFOO=bar"),
            "LOGIN_NAME=new\nFOO=bar\nSERVER_NAME=s\nAUTHENTICATION_METHOD=password"
        );
    }

    #[test]
    fn test_ssh_key_profile_sets_private_key() {
        let out = synthesize(&key_profile(), "AUTHENTICATION_METHOD=password\n");
        assert_eq!(
            out,
            "AUTHENTICATION_METHOD=publickey\n\
             LOGIN_NAME=carol\n\
             SERVER_NAME=hpc.example.com\n\
             PRIVATE_KEY=/home/carol/.ssh/id_ed25519\n"
        );
    }

    #[test]
    fn test_password_profile_leaves_private_key_alone() {
        let base = "PRIVATE_KEY=/old/key\nLOGIN_NAME=x";
        let out = synthesize(&password_profile(), base);
        assert!(out.starts_with("PRIVATE_KEY=/old/key\nLOGIN_NAME=u1"));
    }

    #[test]
    fn test_is_idempotent() {
        let bases = [
            "",
            "\n",
            "FOO=1\nLOGIN_NAME=a\n\n# comment\nLOGIN_NAME=b\nBAR=",
            "SERVER_NAME=x\r\nSOUND=on\r\n",
            "weird line without equals\n=\nLOGIN_NAME_EXTRA=keep",
            "LOGIN_NAME=old\r",
            "FOO=1\r",
        ];
        for profile in [password_profile(), key_profile()] {
            for base in bases {
                let once = synthesize(&profile, base);
                assert_eq!(synthesize(&profile, &once), once, "base {:?}", base);
            }
        }
    }

    #[test]
    fn test_unrelated_lines_keep_order() {
        let base = "Z=1\nLOGIN_NAME=old\nA=2\n# note\nLOGIN_NAME_EXTRA=keep\nM=3";
        let out = synthesize(&key_profile(), base);

        let unrelated: Vec<&str> = out
            .lines()
            .filter(|l| {
                !target_keys(&key_profile())
                    .iter()
                    .any(|(k, _)| l.starts_with(&format!("{}=", k)))
            })
            .collect();
        assert_eq!(
            unrelated,
            vec!["Z=1", "A=2", "# note", "LOGIN_NAME_EXTRA=keep", "M=3"]
        );
    }

    #[test]
    fn test_duplicate_keys_are_all_replaced() {
        let out = synthesize(&password_profile(), "LOGIN_NAME=a\nLOGIN_NAME=b");
        assert_eq!(
            out,
            "LOGIN_NAME=u1\nLOGIN_NAME=u1\nSERVER_NAME=s1\nAUTHENTICATION_METHOD=password"
        );
    }

    #[test]
    fn test_crlf_documents_stay_crlf() {
        let out = synthesize(&password_profile(), "LOGIN_NAME=old\r\nFOO=bar\r\n");
        assert_eq!(
            out,
            "LOGIN_NAME=u1\r\nFOO=bar\r\nSERVER_NAME=s1\r\nAUTHENTICATION_METHOD=password\r\n"
        );
    }

    #[test]
    fn test_unterminated_carriage_return_is_kept() {
        assert_eq!(
            synthesize(&password_profile(), "LOGIN_NAME=old\r"),
            "LOGIN_NAME=u1\r\nSERVER_NAME=s1\r\nAUTHENTICATION_METHOD=password"
        );
    }

    #[test]
    fn test_line_breaks_in_values_stay_on_one_line() {
        let profile = ProfileRecord::password("A", "s", "u\nPRIVATE_KEY=/evil");

        let once = synthesize(&profile, "");
        assert_eq!(
            once,
            "LOGIN_NAME=u\nSERVER_NAME=s\nAUTHENTICATION_METHOD=password"
        );
        assert!(!once.contains(PRIVATE_KEY));
        assert_eq!(synthesize(&profile, &once), once);
    }

    #[test]
    fn test_trailing_newline_is_preserved() {
        let out = synthesize(&password_profile(), "FOO=bar\n");
        assert!(out.ends_with("AUTHENTICATION_METHOD=password\n"));
        assert!(!out.ends_with("\n\n"));
    }
}
