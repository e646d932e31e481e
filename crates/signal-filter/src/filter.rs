//! Moving-average filters for noise reduction

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Channel, ChannelValues, FilterError};

/// Smoothing method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMethod {
    /// Simple moving average over the last `window` samples
    Sma,
    /// Exponential moving average, alpha = 2 / (window + 1)
    #[default]
    Ema,
}

impl fmt::Display for SmoothingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmoothingMethod::Sma => f.write_str("sma"),
            SmoothingMethod::Ema => f.write_str("ema"),
        }
    }
}

impl FromStr for SmoothingMethod {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sma" => Ok(SmoothingMethod::Sma),
            "ema" => Ok(SmoothingMethod::Ema),
            other => Err(FilterError::UnknownMethod(other.to_string())),
        }
    }
}

/// Single-channel moving-average filter
#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    window: usize,
    method: SmoothingMethod,
    alpha: f64,
    buffer: VecDeque<f64>,
    last: Option<f64>,
    samples: usize,
}

impl MovingAverageFilter {
    /// Create a new filter with the given window size
    pub fn new(window: usize, method: SmoothingMethod) -> Result<Self, FilterError> {
        if window == 0 {
            return Err(FilterError::InvalidWindow(window));
        }
        Ok(Self::with_valid_window(window, method))
    }

    fn with_valid_window(window: usize, method: SmoothingMethod) -> Self {
        Self {
            window,
            method,
            alpha: 2.0 / (window as f64 + 1.0),
            buffer: VecDeque::with_capacity(window),
            last: None,
            samples: 0,
        }
    }

    /// Add a raw sample and get the smoothed output
    pub fn update(&mut self, raw: f64) -> f64 {
        self.samples += 1;

        // The ring is kept in both modes so buffer_values() stays meaningful.
        if self.buffer.len() == self.window {
            self.buffer.pop_front();
        }
        self.buffer.push_back(raw);

        match self.method {
            SmoothingMethod::Sma => {
                let sum: f64 = self.buffer.iter().sum();
                let mean = sum / self.buffer.len() as f64;
                self.last = Some(mean);
                mean
            }
            SmoothingMethod::Ema => {
                let next = match self.last {
                    Some(_) if self.window == 1 => raw,
                    // Exact fixed point for constant input
                    Some(prev) => prev + self.alpha * (raw - prev),
                    None => raw,
                };
                self.last = Some(next);
                next
            }
        }
    }

    /// Last smoothed value, `None` before the first sample
    pub fn current(&self) -> Option<f64> {
        self.last
    }

    /// SMA is ready once the window is full, EMA after one sample
    pub fn is_ready(&self) -> bool {
        match self.method {
            SmoothingMethod::Sma => self.buffer.len() >= self.window,
            SmoothingMethod::Ema => self.samples > 0,
        }
    }

    /// Raw samples currently held in the window, oldest first
    pub fn buffer_values(&self) -> Vec<f64> {
        self.buffer.iter().copied().collect()
    }

    /// Total samples submitted since creation or the last reset
    pub fn sample_count(&self) -> usize {
        self.samples
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn method(&self) -> SmoothingMethod {
        self.method
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Reset the filter
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last = None;
        self.samples = 0;
    }
}

/// Independent filters for a subset of channels
///
/// Channels without a filter pass through unchanged.
#[derive(Debug, Clone)]
pub struct MultiChannelFilter {
    filters: [Option<MovingAverageFilter>; Channel::COUNT],
}

impl MultiChannelFilter {
    /// Filter the given channels, leave the rest untouched
    pub fn new(
        channels: &[Channel],
        window: usize,
        method: SmoothingMethod,
    ) -> Result<Self, FilterError> {
        if window == 0 {
            return Err(FilterError::InvalidWindow(window));
        }
        let filters = std::array::from_fn(|i| {
            channels
                .contains(&Channel::ALL[i])
                .then(|| MovingAverageFilter::with_valid_window(window, method))
        });
        debug!(
            "Multi-channel filter: {} channels, window={}, method={}",
            channels.len(),
            window,
            method
        );
        Ok(Self { filters })
    }

    /// Filter every channel
    pub fn all(window: usize, method: SmoothingMethod) -> Result<Self, FilterError> {
        Self::new(&Channel::ALL, window, method)
    }

    /// Build from channel names, rejecting anything outside the channel set
    pub fn from_names(
        names: &[&str],
        window: usize,
        method: SmoothingMethod,
    ) -> Result<Self, FilterError> {
        let channels = names
            .iter()
            .map(|name| name.parse::<Channel>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(&channels, window, method)
    }

    /// Smooth one frame of raw values
    pub fn update(&mut self, raw: &ChannelValues) -> ChannelValues {
        let mut smoothed = *raw;
        for channel in Channel::ALL {
            if let Some(filter) = self.filters[channel.index()].as_mut() {
                smoothed[channel] = filter.update(raw[channel]);
            }
        }
        smoothed
    }

    pub fn filter(&self, channel: Channel) -> Option<&MovingAverageFilter> {
        self.filters[channel.index()].as_ref()
    }

    pub fn is_filtered(&self, channel: Channel) -> bool {
        self.filters[channel.index()].is_some()
    }

    /// True when every configured filter is ready
    pub fn is_ready(&self) -> bool {
        self.filters.iter().flatten().all(MovingAverageFilter::is_ready)
    }

    pub fn reset(&mut self) {
        for filter in self.filters.iter_mut().flatten() {
            filter.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_window_rejected() {
        assert_eq!(
            MovingAverageFilter::new(0, SmoothingMethod::Sma).unwrap_err(),
            FilterError::InvalidWindow(0)
        );
        assert!(MultiChannelFilter::all(0, SmoothingMethod::Ema).is_err());
    }

    #[test]
    fn test_sma_mean_matches_hand_computed() {
        let mut filter = MovingAverageFilter::new(4, SmoothingMethod::Sma).unwrap();

        assert_eq!(filter.update(2.0), 2.0);
        assert_eq!(filter.update(4.0), 3.0);
        assert!(!filter.is_ready());
        filter.update(6.0);
        assert!(!filter.is_ready());
        assert_eq!(filter.update(8.0), 5.0);
        assert!(filter.is_ready());

        // 2.0 falls out: (4 + 6 + 8 + 10) / 4
        assert_eq!(filter.update(10.0), 7.0);
        assert_eq!(filter.buffer_values(), vec![4.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn test_ema_alpha_and_first_sample() {
        let mut filter = MovingAverageFilter::new(7, SmoothingMethod::Ema).unwrap();
        assert!((filter.alpha() - 0.25).abs() < 1e-12);
        assert!(!filter.is_ready());
        assert_eq!(filter.current(), None);

        assert_eq!(filter.update(1.0), 1.0);
        assert!(filter.is_ready());

        let next = filter.update(0.0);
        assert!((next - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_ema_window_one_passes_through() {
        let mut filter = MovingAverageFilter::new(1, SmoothingMethod::Ema).unwrap();
        filter.update(0.3);
        assert_eq!(filter.update(0.2), 0.2);
        filter.update(1e9);
        assert_eq!(filter.update(0.21), 0.21);
    }

    #[test]
    fn test_ema_holds_constant_input_exactly() {
        // The weighted-sum form drifts by one ulp for this pair
        let mut filter = MovingAverageFilter::new(25, SmoothingMethod::Ema).unwrap();
        for _ in 0..50 {
            assert_eq!(filter.update(0.21), 0.21);
        }
    }

    #[test]
    fn test_reset_clears_state() {
        let mut filter = MovingAverageFilter::new(3, SmoothingMethod::Sma).unwrap();
        for v in [1.0, 2.0, 3.0] {
            filter.update(v);
        }
        assert!(filter.is_ready());

        filter.reset();
        assert!(!filter.is_ready());
        assert_eq!(filter.sample_count(), 0);
        assert!(filter.buffer_values().is_empty());
        assert_eq!(filter.current(), None);
        assert_eq!(filter.update(9.0), 9.0);
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("EMA".parse::<SmoothingMethod>().unwrap(), SmoothingMethod::Ema);
        assert_eq!("sma".parse::<SmoothingMethod>().unwrap(), SmoothingMethod::Sma);
        assert!("median".parse::<SmoothingMethod>().is_err());
    }

    #[test]
    fn test_unfiltered_channels_pass_through() {
        let mut filter =
            MultiChannelFilter::new(&[Channel::Ear], 3, SmoothingMethod::Sma).unwrap();
        assert!(filter.is_filtered(Channel::Ear));
        assert!(!filter.is_filtered(Channel::Ipd));

        filter.update(&ChannelValues::zeroed().with(Channel::Ear, 0.3).with(Channel::Ipd, 0.1));
        let out =
            filter.update(&ChannelValues::zeroed().with(Channel::Ear, 0.1).with(Channel::Ipd, 0.5));

        assert!((out[Channel::Ear] - 0.2).abs() < 1e-12);
        assert_eq!(out[Channel::Ipd], 0.5);
    }

    #[test]
    fn test_from_names_rejects_typos() {
        let err = MultiChannelFilter::from_names(&["ear", "head_pich"], 5, SmoothingMethod::Ema)
            .unwrap_err();
        assert_eq!(err, FilterError::UnknownChannel("head_pich".into()));

        let ok = MultiChannelFilter::from_names(&["ear", "head_pitch"], 5, SmoothingMethod::Ema)
            .unwrap();
        assert!(ok.is_filtered(Channel::HeadPitch));
    }

    #[test]
    fn test_multi_channel_reset() {
        let mut filter = MultiChannelFilter::all(2, SmoothingMethod::Sma).unwrap();
        filter.update(&ChannelValues::from_fn(|_| 1.0));
        filter.update(&ChannelValues::from_fn(|_| 1.0));
        assert!(filter.is_ready());

        filter.reset();
        assert!(!filter.is_ready());
        assert_eq!(filter.filter(Channel::Ear).unwrap().sample_count(), 0);
    }

    proptest! {
        #[test]
        fn prop_ema_constant_input_is_fixed_point(
            c in -1000.0f64..1000.0,
            window in 1usize..30,
            n in 1usize..100,
        ) {
            let mut filter = MovingAverageFilter::new(window, SmoothingMethod::Ema).unwrap();
            for _ in 0..n {
                let out = filter.update(c);
                prop_assert_eq!(out, c);
            }
        }

        #[test]
        fn prop_sma_stays_within_input_range(
            values in proptest::collection::vec(-100.0f64..100.0, 1..50),
            window in 1usize..10,
        ) {
            let mut filter = MovingAverageFilter::new(window, SmoothingMethod::Sma).unwrap();
            let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            for v in values {
                let out = filter.update(v);
                prop_assert!(out >= lo - 1e-9 && out <= hi + 1e-9);
            }
        }
    }
}
