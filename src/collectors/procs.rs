//! Process lookup.
//!
//! Parses `/proc/[pid]/comm` on Linux to find a well-known process whose PID
//! gives synthetic pipe names some context. Other platforms always get
//! [`FALLBACK_PID`].

/// Name fragments tried by [`find_pid_by_markers`] in the default sampler.
pub const DEFAULT_MARKERS: &[&str] = &["chrome", "firefox", "explorer"];

/// PID used when no process matches.
pub const FALLBACK_PID: u32 = 1;

/// Returns the lowest PID whose name contains one of `markers`
/// (case-insensitive), or [`FALLBACK_PID`].
#[must_use]
pub fn find_pid_by_markers(markers: &[&str]) -> u32 {
    let mut procs = list_processes();
    procs.sort_unstable_by_key(|(pid, _)| *pid);
    first_match(procs.iter().map(|(pid, name)| (*pid, name.as_str())), markers)
        .unwrap_or(FALLBACK_PID)
}

/// First `(pid, name)` pair whose lower-cased name contains a marker.
fn first_match<'a>(
    procs: impl IntoIterator<Item = (u32, &'a str)>,
    markers: &[&str],
) -> Option<u32> {
    procs.into_iter().find_map(|(pid, name)| {
        let name = name.to_ascii_lowercase();
        markers
            .iter()
            .any(|m| name.contains(&m.to_ascii_lowercase()))
            .then_some(pid)
    })
}

/// Lists `(pid, comm)` for every readable process.
#[cfg(target_os = "linux")]
fn list_processes() -> Vec<(u32, String)> {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };

    entries
        .flatten()
        .filter_map(|entry| {
            let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
            // Processes can exit between readdir and read
            let comm = std::fs::read_to_string(entry.path().join("comm")).ok()?;
            Some((pid, comm.trim().to_string()))
        })
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn list_processes() -> Vec<(u32, String)> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_case_insensitive() {
        let procs = [(10, "bash"), (42, "Firefox-bin"), (50, "chrome")];
        assert_eq!(first_match(procs, DEFAULT_MARKERS), Some(42));
    }

    #[test]
    fn test_first_match_none() {
        let procs = [(10, "bash"), (11, "sshd")];
        assert_eq!(first_match(procs, DEFAULT_MARKERS), None);
    }

    #[test]
    fn test_unmatched_marker_falls_back() {
        assert_eq!(find_pid_by_markers(&["no-such-process-name-xyzzy"]), FALLBACK_PID);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_lists_self() {
        let me = std::process::id();
        assert!(list_processes().iter().any(|(pid, _)| *pid == me));
    }
}
