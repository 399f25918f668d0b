use chrono::Utc;

/// Milliseconds since the unix epoch, or zero if the clock is before it.
#[inline]
pub fn current_time_millis() -> u128 {
    let millis = Utc::now().timestamp_millis();
    if millis < 0 {
        0
    } else {
        millis as u128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_is_monotonic_enough() {
        let first = current_time_millis();
        let second = current_time_millis();
        assert!(first > 0);
        assert!(second >= first);
    }
}
