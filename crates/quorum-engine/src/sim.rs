//! Synthetic random-walk market feed for paper runs and demos.
//!
//! Indicators are computed incrementally the standard way (EMA
//! recurrence, Wilder smoothing for RSI/ATR/ADX, SMA +/- 2 sigma
//! bands) so snapshots look like real feed output.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;
use std::rc::Rc;

use quorum_core::{
    Clock, DataError, HtfView, IndicatorSeries, MarketFeed, MarketSnapshot,
};

const HISTORY_CAP: usize = 64;
const RSI_PERIOD: f64 = 14.0;
const ATR_PERIOD: f64 = 14.0;
const ADX_PERIOD: f64 = 14.0;
const BAND_PERIOD: usize = 20;

/// Simulated clock shared between the feed driver and the engine.
#[derive(Clone)]
pub struct SharedClock(Rc<Cell<DateTime<Utc>>>);

impl SharedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Rc::new(Cell::new(start)))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.0.set(now);
    }
}

impl Clock for SharedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.get()
    }
}

/// Three-slot ring for the indicator window.
#[derive(Debug, Clone, Copy, Default)]
struct Window3([f64; 3]);

impl Window3 {
    fn push(&mut self, value: f64) {
        self.0 = [value, self.0[0], self.0[1]];
    }

    fn series(&self) -> IndicatorSeries {
        IndicatorSeries::new(self.0[0], self.0[1], self.0[2])
    }
}

#[derive(Debug, Clone, Copy)]
struct Ema {
    period: f64,
    value: f64,
    seeded: bool,
}

impl Ema {
    fn new(period: u32) -> Self {
        Self {
            period: period as f64,
            value: 0.0,
            seeded: false,
        }
    }

    fn update(&mut self, close: f64) -> f64 {
        if !self.seeded {
            self.value = close;
            self.seeded = true;
        } else {
            let k = 2.0 / (self.period + 1.0);
            self.value += k * (close - self.value);
        }
        self.value
    }
}

pub struct SimFeed {
    instrument: String,
    rng: StdRng,
    price: f64,
    spread: f64,
    time: DateTime<Utc>,
    interval: Duration,
    new_interval: bool,

    closes: Vec<f64>,
    highs: Vec<f64>,
    lows: Vec<f64>,
    volumes: Vec<f64>,

    ema_fast: Ema,
    ema_medium: Ema,
    ema_slow: Ema,
    ema_trend: Ema,
    ema_anchor: Ema,

    avg_gain: f64,
    avg_loss: f64,
    atr: f64,
    smoothed_tr: f64,
    smoothed_pdm: f64,
    smoothed_ndm: f64,
    adx: f64,

    w_ema_fast: Window3,
    w_ema_medium: Window3,
    w_ema_slow: Window3,
    w_ema_trend: Window3,
    w_ema_anchor: Window3,
    w_rsi: Window3,
    w_atr: Window3,
    w_adx: Window3,
    w_band_upper: Window3,
    w_band_mid: Window3,
    w_band_lower: Window3,
}

impl SimFeed {
    pub fn new(
        instrument: impl Into<String>,
        seed: u64,
        start_price: f64,
        start_time: DateTime<Utc>,
        interval: Duration,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            rng: StdRng::seed_from_u64(seed),
            price: start_price,
            spread: start_price * 0.0002,
            time: start_time,
            interval,
            new_interval: false,
            closes: Vec::new(),
            highs: Vec::new(),
            lows: Vec::new(),
            volumes: Vec::new(),
            ema_fast: Ema::new(8),
            ema_medium: Ema::new(21),
            ema_slow: Ema::new(50),
            ema_trend: Ema::new(100),
            ema_anchor: Ema::new(200),
            avg_gain: 0.0,
            avg_loss: 0.0,
            atr: 0.0,
            smoothed_tr: 0.0,
            smoothed_pdm: 0.0,
            smoothed_ndm: 0.0,
            adx: 20.0,
            w_ema_fast: Window3::default(),
            w_ema_medium: Window3::default(),
            w_ema_slow: Window3::default(),
            w_ema_trend: Window3::default(),
            w_ema_anchor: Window3::default(),
            w_rsi: Window3::default(),
            w_atr: Window3::default(),
            w_adx: Window3::default(),
            w_band_upper: Window3::default(),
            w_band_mid: Window3::default(),
            w_band_lower: Window3::default(),
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn quote(&self) -> (f64, f64) {
        (self.price, self.price + self.spread)
    }

    /// Advance one interval: generate a bar and refresh indicators.
    /// Returns the new simulated timestamp.
    pub fn step(&mut self) -> DateTime<Utc> {
        let open = self.price;
        // Mild drift plus noise; fat-ish tails from summing uniforms.
        let shock: f64 = (0..3).map(|_| self.rng.gen_range(-1.0..1.0)).sum::<f64>() / 3.0;
        let ret = shock * 0.006 + 0.0002;
        let close = (open * (1.0 + ret)).max(1.0);
        let wick = open.abs() * self.rng.gen_range(0.0..0.003);
        let high = open.max(close) + wick;
        let low = (open.min(close) - wick).max(0.5);
        let volume = self.rng.gen_range(5.0..50.0);

        let prev_close = self.closes.first().copied().unwrap_or(open);
        let prev_high = self.highs.first().copied().unwrap_or(high);
        let prev_low = self.lows.first().copied().unwrap_or(low);

        self.closes.insert(0, close);
        self.highs.insert(0, high);
        self.lows.insert(0, low);
        self.volumes.insert(0, volume);
        self.closes.truncate(HISTORY_CAP);
        self.highs.truncate(HISTORY_CAP);
        self.lows.truncate(HISTORY_CAP);
        self.volumes.truncate(HISTORY_CAP);

        self.w_ema_fast.push(self.ema_fast.update(close));
        self.w_ema_medium.push(self.ema_medium.update(close));
        self.w_ema_slow.push(self.ema_slow.update(close));
        self.w_ema_trend.push(self.ema_trend.update(close));
        self.w_ema_anchor.push(self.ema_anchor.update(close));

        self.update_rsi(close, prev_close);
        self.update_atr(high, low, prev_close);
        self.update_adx(high, low, prev_high, prev_low, prev_close);
        self.update_bands();

        self.price = close;
        self.spread = close * 0.0002;
        self.time += self.interval;
        self.new_interval = true;
        self.time
    }

    fn update_rsi(&mut self, close: f64, prev_close: f64) {
        let change = close - prev_close;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        self.avg_gain = (self.avg_gain * (RSI_PERIOD - 1.0) + gain) / RSI_PERIOD;
        self.avg_loss = (self.avg_loss * (RSI_PERIOD - 1.0) + loss) / RSI_PERIOD;
        let rsi = if self.avg_loss <= f64::EPSILON {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + self.avg_gain / self.avg_loss)
        };
        self.w_rsi.push(rsi);
    }

    fn update_atr(&mut self, high: f64, low: f64, prev_close: f64) {
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        if self.atr <= 0.0 {
            self.atr = tr;
        } else {
            self.atr = (self.atr * (ATR_PERIOD - 1.0) + tr) / ATR_PERIOD;
        }
        self.w_atr.push(self.atr);
    }

    fn update_adx(&mut self, high: f64, low: f64, prev_high: f64, prev_low: f64, prev_close: f64) {
        let up = high - prev_high;
        let down = prev_low - low;
        let pdm = if up > down && up > 0.0 { up } else { 0.0 };
        let ndm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        let k = (ADX_PERIOD - 1.0) / ADX_PERIOD;
        self.smoothed_tr = self.smoothed_tr * k + tr;
        self.smoothed_pdm = self.smoothed_pdm * k + pdm;
        self.smoothed_ndm = self.smoothed_ndm * k + ndm;

        if self.smoothed_tr > 0.0 {
            let di_plus = 100.0 * self.smoothed_pdm / self.smoothed_tr;
            let di_minus = 100.0 * self.smoothed_ndm / self.smoothed_tr;
            let denom = di_plus + di_minus;
            if denom > 0.0 {
                let dx = 100.0 * (di_plus - di_minus).abs() / denom;
                self.adx = (self.adx * (ADX_PERIOD - 1.0) + dx) / ADX_PERIOD;
            }
        }
        self.w_adx.push(self.adx);
    }

    fn update_bands(&mut self) {
        let n = self.closes.len().min(BAND_PERIOD);
        let window = &self.closes[..n];
        let mean = window.iter().sum::<f64>() / n as f64;
        let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n as f64;
        let sigma = variance.sqrt();
        self.w_band_upper.push(mean + 2.0 * sigma);
        self.w_band_mid.push(mean);
        self.w_band_lower.push(mean - 2.0 * sigma);
    }
}

impl MarketFeed for SimFeed {
    fn snapshot(&self) -> Result<MarketSnapshot, DataError> {
        if self.closes.len() < 3 {
            return Err(DataError::NoData(self.instrument.clone()));
        }
        let (bid, ask) = self.quote();
        Ok(MarketSnapshot {
            instrument: self.instrument.clone(),
            timestamp: self.time,
            bid,
            ask,
            closes: self.closes.clone(),
            highs: self.highs.clone(),
            lows: self.lows.clone(),
            volumes: self.volumes.clone(),
            ema_fast: self.w_ema_fast.series(),
            ema_medium: self.w_ema_medium.series(),
            ema_slow: self.w_ema_slow.series(),
            ema_trend: self.w_ema_trend.series(),
            ema_anchor: self.w_ema_anchor.series(),
            rsi: self.w_rsi.series(),
            atr: self.w_atr.series(),
            adx: self.w_adx.series(),
            band_upper: self.w_band_upper.series(),
            band_mid: self.w_band_mid.series(),
            band_lower: self.w_band_lower.series(),
            htf: Some(HtfView {
                bullish: self.w_ema_fast.series().current > self.w_ema_slow.series().current,
                bearish: self.w_ema_fast.series().current < self.w_ema_slow.series().current,
            }),
        })
    }

    fn is_new_interval(&mut self) -> bool {
        std::mem::take(&mut self.new_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn feed() -> SimFeed {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        SimFeed::new("SIMUSD", 42, 50_000.0, start, Duration::minutes(5))
    }

    #[test]
    fn warmed_up_feed_produces_complete_snapshots() {
        let mut feed = feed();
        for _ in 0..250 {
            feed.step();
        }
        let snapshot = feed.snapshot().unwrap();
        assert!(snapshot.is_complete(21));
        assert!(snapshot.atr.current > 0.0);
        assert!(snapshot.rsi.current > 0.0 && snapshot.rsi.current < 100.0);
        assert!(snapshot.ask > snapshot.bid);
    }

    #[test]
    fn new_interval_flag_fires_once_per_step() {
        let mut feed = feed();
        feed.step();
        assert!(feed.is_new_interval());
        assert!(!feed.is_new_interval());
        feed.step();
        assert!(feed.is_new_interval());
    }

    #[test]
    fn empty_feed_has_no_snapshot() {
        let feed = feed();
        assert!(feed.snapshot().is_err());
    }

    #[test]
    fn deterministic_under_fixed_seed() {
        let mut a = feed();
        let mut b = feed();
        for _ in 0..50 {
            a.step();
            b.step();
        }
        assert_eq!(a.quote(), b.quote());
        assert_eq!(
            a.snapshot().unwrap().closes,
            b.snapshot().unwrap().closes
        );
    }

    #[test]
    fn shared_clock_reflects_updates() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let clock = SharedClock::new(start);
        let handle = clock.clone();
        handle.set(start + Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));
    }
}
