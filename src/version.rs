pub(crate) const RELEASE_VERSION: &str = match option_env!("SIEVE_GIT_TAG") {
    Some(value) => value,
    None => env!("CARGO_PKG_VERSION"),
};

const BUILD_COMMIT: Option<&str> = option_env!("SIEVE_GIT_COMMIT");

pub(crate) fn release_version() -> &'static str {
    RELEASE_VERSION
}

/// Version as shown in the startup banner, with the commit when the build knew it.
pub(crate) fn display_version() -> String {
    format_display_version(release_version(), BUILD_COMMIT)
}

fn format_display_version(version: &str, commit: Option<&str>) -> String {
    let version = if version.starts_with('v') || version.starts_with('V') {
        version.to_string()
    } else if version.chars().next().is_some_and(|ch| ch.is_ascii_digit()) {
        format!("v{version}")
    } else {
        version.to_string()
    };

    match commit {
        Some(commit) if !commit.is_empty() => format!("{version} ({commit})"),
        _ => version,
    }
}
