/// Allocator settings. There is not much to tune: placement, splitting and
/// coalescing are fixed, so the only switch is whether headers recovered from
/// user pointers are checked before being trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Check the tag and free flag of every header recovered from a pointer
    /// passed to `release` or `resize`. A bad header makes the call a no-op
    /// instead of corrupting the free list.
    pub verify_headers: bool,
}

impl Config {
    pub const fn new() -> Self {
        Self { verify_headers: cfg!(debug_assertions) }
    }

    pub const fn with_header_checks(mut self, enabled: bool) -> Self {
        self.verify_headers = enabled;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_follows_build_profile() {
        assert_eq!(Config::default().verify_headers, cfg!(debug_assertions));
    }

    #[test]
    fn header_checks_can_be_toggled() {
        assert!(Config::new().with_header_checks(true).verify_headers);
        assert!(!Config::new().with_header_checks(false).verify_headers);
    }
}
