use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::log_debug;

/// Process-table lookup shared by concrete [`PlayerBackend`] implementations
/// to answer `is_app_running` without touching the app's scripting bridge.
///
/// [`PlayerBackend`]: super::PlayerBackend
pub struct ProcessWatcher {
    system: System,
    poll_count: u64,
}

impl ProcessWatcher {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            poll_count: 0,
        }
    }

    /// Refresh the process table and report whether a process matching
    /// `needle` is present. Matching is by exact process name or by
    /// executable path substring, the latter catching helper binaries that
    /// ship under a versioned path.
    pub fn is_running(&mut self, needle: &str) -> bool {
        self.poll_count += 1;
        // Use everything() to ensure process names and exe paths are populated
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::everything());

        let found = self.system.processes().values().any(|process| {
            let name = process.name().to_string_lossy();
            let exe = process.exe().map(|path| path.to_string_lossy());
            name_matches(&name, exe.as_deref(), needle)
        });

        if self.poll_count % 30 == 1 {
            log_debug!(
                "[process_watcher] poll #{}: '{}' running={}, total processes={}",
                self.poll_count,
                needle,
                found,
                self.system.processes().len()
            );
        }

        found
    }
}

impl Default for ProcessWatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn name_matches(name: &str, exe: Option<&str>, needle: &str) -> bool {
    if name.eq_ignore_ascii_case(needle) {
        return true;
    }

    if let Some(exe) = exe {
        let exe = exe.to_ascii_lowercase();
        let needle = needle.to_ascii_lowercase();
        // "/Applications/Spotify.app/Contents/MacOS/Spotify" should match
        // "spotify" without also matching our own helper binaries.
        if exe
            .rsplit('/')
            .next()
            .map(|file| file.contains(&needle))
            .unwrap_or(false)
        {
            return true;
        }
    }

    false
}
