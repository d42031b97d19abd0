// Failure diagnostics - turns engine stderr into a short reason and hint

/// Why the engine refused an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// HTTP 403 Forbidden
    Forbidden,
    /// HTTP 429 or explicit throttling
    RateLimited,
    /// "confirm you're not a bot"
    BotCheck,
    AgeRestricted,
    PrivateVideo,
    /// Deleted, removed or otherwise gone
    Unavailable,
    GeoBlocked,
    /// DRM or paid content, cannot be downloaded at all
    Protected,
    NetworkTimeout,
    /// Requested format does not exist for this item
    FormatUnavailable,
}

impl FailureReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Forbidden => "Access denied (HTTP 403)",
            Self::RateLimited => "Rate limited by the site",
            Self::BotCheck => "Bot detection triggered",
            Self::AgeRestricted => "Age-restricted content",
            Self::PrivateVideo => "Private video",
            Self::Unavailable => "Video unavailable",
            Self::GeoBlocked => "Geographic restriction",
            Self::Protected => "DRM-protected or paid content",
            Self::NetworkTimeout => "Network timeout",
            Self::FormatUnavailable => "Requested quality not available",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Self::Forbidden | Self::BotCheck => "update yt-dlp and try again later",
            Self::RateLimited => "wait a while or lower --concurrency",
            Self::AgeRestricted | Self::PrivateVideo => "the video needs a signed-in account",
            Self::Unavailable | Self::Protected => "this item cannot be downloaded",
            Self::GeoBlocked => "try a connection from another region",
            Self::NetworkTimeout => "check your connection and retry",
            Self::FormatUnavailable => "try --quality best",
        }
    }
}

/// Analyze an error message and return the most specific reason found
pub fn diagnose_error(error: &str) -> Option<FailureReason> {
    let lower = error.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    // Permanent restrictions first, they often mention 403 as well
    if has(&["drm", "widevine", "requires purchase", "rental", "this video requires payment"]) {
        return Some(FailureReason::Protected);
    }
    if has(&["private video", "video is private"]) {
        return Some(FailureReason::PrivateVideo);
    }
    if has(&["sign in to confirm your age", "age-restricted", "age restricted"]) {
        return Some(FailureReason::AgeRestricted);
    }
    if has(&["not a bot", "captcha"]) {
        return Some(FailureReason::BotCheck);
    }
    if has(&["not available in your country", "geo restriction", "geo-restricted"]) {
        return Some(FailureReason::GeoBlocked);
    }
    if has(&["video unavailable", "has been removed", "this video is no longer available"]) {
        return Some(FailureReason::Unavailable);
    }
    if has(&["requested format is not available"]) {
        return Some(FailureReason::FormatUnavailable);
    }
    if has(&["http error 429", "too many requests", "rate limit"]) {
        return Some(FailureReason::RateLimited);
    }
    if has(&["http error 403", "forbidden"]) {
        return Some(FailureReason::Forbidden);
    }
    if has(&["timed out", "timeout"]) {
        return Some(FailureReason::NetworkTimeout);
    }

    None
}

/// Keep the lines of engine stderr worth showing to a user
pub fn summarize_stderr(stderr: &str) -> String {
    let important: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:") || l.contains("HTTP Error"))
        .take(2)
        .collect();

    if !important.is_empty() {
        return important.join(" | ");
    }

    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("unknown error")
        .chars()
        .take(200)
        .collect()
}

/// Summary plus a hint when the reason is recognised
pub fn explain(stderr: &str) -> String {
    let summary = summarize_stderr(stderr);
    match diagnose_error(stderr) {
        Some(reason) => format!("{} ({}: {})", summary, reason.description(), reason.hint()),
        None => summary,
    }
}
