//! Candidate IPC endpoint paths.
//!
//! The peer listens on the first free slot of `discord-ipc-0` through
//! `discord-ipc-9`: a named pipe on Windows, a Unix domain socket in the
//! runtime directory elsewhere.

use std::path::PathBuf;

/// Number of endpoint slots defined by the protocol.
pub const ENDPOINT_COUNT: u8 = 10;

/// File / pipe name prefix; the slot index is appended.
const ENDPOINT_PREFIX: &str = "discord-ipc-";

/// Environment variables consulted, in order, for the socket directory.
#[cfg(not(windows))]
pub const RUNTIME_DIR_VARS: [&str; 4] = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"];

/// Directory used when none of [`RUNTIME_DIR_VARS`] is set.
#[cfg(not(windows))]
pub const FALLBACK_RUNTIME_DIR: &str = "/tmp";

/// Returns the path of endpoint slot `index` (`0..ENDPOINT_COUNT`).
pub fn endpoint_path(index: u8) -> PathBuf {
    debug_assert!(index < ENDPOINT_COUNT, "endpoint index {index} out of range");

    #[cfg(windows)]
    {
        PathBuf::from(format!(r"\\?\pipe\{ENDPOINT_PREFIX}{index}"))
    }

    #[cfg(not(windows))]
    {
        runtime_dir(|name| std::env::var(name).ok()).join(format!("{ENDPOINT_PREFIX}{index}"))
    }
}

/// Resolves the socket directory through `lookup`, skipping empty values.
#[cfg(not(windows))]
pub fn runtime_dir(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    RUNTIME_DIR_VARS
        .into_iter()
        .filter_map(|name| lookup(name))
        .find(|dir| !dir.is_empty())
        .map(|dir| match dir.strip_suffix('/') {
            Some("") | None => PathBuf::from(&dir),
            Some(trimmed) => PathBuf::from(trimmed),
        })
        .unwrap_or_else(|| PathBuf::from(FALLBACK_RUNTIME_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_the_suffix() {
        for index in 0..ENDPOINT_COUNT {
            let path = endpoint_path(index);
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert_eq!(name, format!("discord-ipc-{index}"));
        }
    }

    #[cfg(not(windows))]
    #[test]
    fn runtime_dir_order() {
        let env = |pairs: &'static [(&'static str, &'static str)]| {
            move |name: &str| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.to_string())
            }
        };

        assert_eq!(
            runtime_dir(env(&[("TMPDIR", "/var/tmp/"), ("XDG_RUNTIME_DIR", "/run/user/1000")])),
            PathBuf::from("/run/user/1000")
        );
        assert_eq!(
            runtime_dir(env(&[("TEMP", "/temp"), ("TMP", "/tmp2")])),
            PathBuf::from("/tmp2")
        );
        assert_eq!(
            runtime_dir(env(&[("TMPDIR", "/var/tmp/")])),
            PathBuf::from("/var/tmp")
        );
        assert_eq!(
            runtime_dir(env(&[("XDG_RUNTIME_DIR", ""), ("TEMP", "/temp")])),
            PathBuf::from("/temp")
        );
        assert_eq!(runtime_dir(env(&[])), PathBuf::from("/tmp"));
    }

    #[cfg(not(windows))]
    #[test]
    fn root_runtime_dir_is_kept() {
        let lookup = |name: &str| (name == "XDG_RUNTIME_DIR").then(|| "/".to_string());
        assert_eq!(runtime_dir(lookup), PathBuf::from("/"));
        assert_eq!(
            runtime_dir(lookup).join("discord-ipc-0"),
            PathBuf::from("/discord-ipc-0")
        );

        let doubled = |name: &str| (name == "TMPDIR").then(|| "/var/tmp//".to_string());
        assert_eq!(runtime_dir(doubled), PathBuf::from("/var/tmp/"));
    }
}
