use std::fmt;
use std::time::Duration;

/// Latency samples of repeated inferences.
#[derive(Debug, Default)]
pub struct Timings {
    samples: Vec<Duration>,
}

impl Timings {
    pub fn record(&mut self, d: Duration) {
        self.samples.push(d);
    }

    pub fn total(&self) -> Duration {
        self.samples.iter().sum()
    }

    pub fn mean(&self) -> Option<Duration> {
        let n = u32::try_from(self.samples.len()).ok().filter(|n| *n > 0)?;
        Some(self.total() / n)
    }

    /// Nearest-rank percentile, `p` in `0..=100`.
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        percentile(&sorted, p)
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0 * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.saturating_sub(1).min(sorted.len() - 1)])
}

impl fmt::Display for Timings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Some(mean), Some(p50), Some(p99)) =
            (self.mean(), self.percentile(50.0), self.percentile(99.0))
        else {
            return f.write_str("no samples");
        };
        write!(
            f,
            "{} runs, mean {:.3} ms, p50 {:.3} ms, p99 {:.3} ms",
            self.samples.len(),
            ms(mean),
            ms(p50),
            ms(p99)
        )
    }
}

pub fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}
