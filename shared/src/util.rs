/// 获取当前 UTC 时间戳（秒）
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Seconds in one day — used for appointment-window resets.
pub const ONE_DAY_SECS: i64 = 86_400;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_secs_is_positive() {
        assert!(now_secs() > 1_700_000_000);
    }
}
