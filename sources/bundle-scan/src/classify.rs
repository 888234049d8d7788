use manifest::{FileModifier, FileStatus};

/// Path prefixes that are evaluated top-to-bottom; the first match wins. Order matters:
/// `/usr/lib/modules` and `/usr/lib/kernel` must be checked before the catch-all case, and
/// `/var`/`/run`/`/tmp` before `/etc` (they never overlap, but keeping one table in
/// declaration order mirrors how the rule reads in the specification).
const STATE_PREFIXES: &[&str] = &["/var", "/run", "/tmp"];
const BOOT_PREFIXES: &[&str] = &["/boot", "/usr/lib/modules", "/usr/lib/kernel"];
const CONFIG_PREFIX: &str = "/etc";

/// Classifies `name` (an absolute path from the bundle root) into the `(modifier, status)`
/// pair the bundle chroot scanner assigns, per the path-prefix rules.
pub fn classify(name: &str) -> (FileModifier, FileStatus) {
    if has_prefix(name, STATE_PREFIXES) {
        return (FileModifier::State, FileStatus::Ghosted);
    }
    if has_prefix(name, &[CONFIG_PREFIX]) {
        return (FileModifier::Config, FileStatus::Present);
    }
    if has_prefix(name, BOOT_PREFIXES) {
        return (FileModifier::Boot, FileStatus::Present);
    }
    (FileModifier::None, FileStatus::Present)
}

/// Whether `name` is `prefix` itself or a path underneath it (`/etc` matches `/etc` and
/// `/etc/foo`, but not `/etcetera`).
fn has_prefix(name: &str, prefixes: &[&str]) -> bool {
    prefixes
        .iter()
        .any(|prefix| name == *prefix || name.starts_with(&format!("{prefix}/")))
}
