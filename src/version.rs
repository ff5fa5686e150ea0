/// Returns the `dlock` version information printed by `--version` on every
/// binary and logged once at server startup.
pub fn friendly_version() -> String {
    let fallback = "Unknown (env var does not exist when building)";
    format!(
        "\nRelease Version:   {}\
         \nGit Commit Hash:   {}\
         \nGit Commit Branch: {}\
         \nUTC Build Time:    {}\
         \nRust Version:      {}\
         \nProfile:           {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("DLOCK_BUILD_GIT_HASH").unwrap_or(fallback),
        option_env!("DLOCK_BUILD_GIT_BRANCH").unwrap_or(fallback),
        option_env!("DLOCK_BUILD_TIME").unwrap_or(fallback),
        option_env!("DLOCK_BUILD_RUSTC_VERSION").unwrap_or(fallback),
        option_env!("DLOCK_PROFILE").unwrap_or(fallback),
    )
}
