//! Wall-clock helpers.

/// Current wall-clock time in microseconds since the Unix epoch.
///
/// All persisted timestamps and change events use this resolution.
#[must_use]
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

#[cfg(test)]
mod tests {
    use super::now_us;

    #[test]
    fn now_is_after_2020() {
        // 2020-01-01T00:00:00Z in microseconds.
        assert!(now_us() > 1_577_836_800_000_000);
    }
}
