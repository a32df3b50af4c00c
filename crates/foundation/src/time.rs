/// Wall-clock instant in seconds since the Unix epoch.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64);

impl Time {
    pub fn from_unix_millis(ms: u64) -> Self {
        Time(ms as f64 / 1000.0)
    }

    pub fn now() -> Self {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::from_unix_millis(ms)
    }

    pub fn as_unix_seconds(&self) -> f64 {
        self.0
    }

    pub fn as_unix_millis(&self) -> u64 {
        (self.0 * 1000.0).max(0.0).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::Time;

    #[test]
    fn millis_round_trip() {
        let t = Time::from_unix_millis(1_700_000_000_250);
        assert_eq!(t.as_unix_millis(), 1_700_000_000_250);
        assert_eq!(t.as_unix_seconds(), 1_700_000_000.25);
    }
}
