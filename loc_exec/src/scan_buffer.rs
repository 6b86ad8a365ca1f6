//! # Scan buffer
//!
//! Hands scans from the sensor callback thread to the control loop. The callback appends frames
//! until more than `threshold` points have accumulated, at which point the scan is marked ready
//! and the waiting loop is woken. While a scan is ready any further points are dropped, so the
//! buffer is never modified while the loop is draining it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Condvar, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use log::trace;

use comms_if::eqpt::lidar::{LidarFrame, LidarPoint};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Single producer, single consumer scan hand-off.
pub struct ScanBuffer {
    inner: Mutex<Inner>,
    ready_cv: Condvar,

    /// The scan is ready once it holds strictly more points than this
    threshold: usize,

    /// Points with a squared range at or below this are discarded
    min_range_sq_m2: f64,
}

/// A complete scan taken from the buffer.
#[derive(Debug, Clone)]
pub struct Scan {
    /// Points in the sensor frame
    pub points: Vec<LidarPoint>,

    /// Time at which the scan became ready
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    points: Vec<LidarPoint>,
    ready: bool,
    ready_at: Option<DateTime<Utc>>,
    num_dropped: usize,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ScanBufferError {
    #[error("The scan threshold must be greater than zero")]
    ZeroThreshold,

    #[error("The minimum sensor range must be finite and non-negative, found {0}")]
    InvalidMinRange(f64),

    #[error("The scan buffer lock was poisoned by a panicking thread")]
    Poisoned,

    #[error("No scan was completed within {0} s")]
    Timeout(f64),
}

/// What happened to a frame pushed into the buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Points were added, the scan is not complete yet
    Accumulating,

    /// Points were added and completed the scan
    ScanReady,

    /// A scan is waiting to be taken, the frame was dropped
    Dropped,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ScanBuffer {
    pub fn new(threshold: usize, min_range_sq_m2: f64) -> Result<Self, ScanBufferError> {
        if threshold == 0 {
            return Err(ScanBufferError::ZeroThreshold);
        }
        if !(min_range_sq_m2 >= 0.0 && min_range_sq_m2.is_finite()) {
            return Err(ScanBufferError::InvalidMinRange(min_range_sq_m2));
        }

        Ok(Self {
            inner: Mutex::new(Inner::default()),
            ready_cv: Condvar::new(),
            threshold,
            min_range_sq_m2,
        })
    }

    /// Append a frame from the sensor, called from the sensor thread.
    pub fn push_frame(&self, frame: &LidarFrame) -> Result<PushOutcome, ScanBufferError> {
        let mut inner = self.lock()?;

        if inner.ready {
            inner.num_dropped += frame.points.len();
            return Ok(PushOutcome::Dropped);
        }

        let min_range_sq_m2 = self.min_range_sq_m2;
        inner.points.extend(
            frame
                .points
                .iter()
                .filter(|p| p.range_sq() > min_range_sq_m2),
        );

        if inner.points.len() > self.threshold {
            inner.ready = true;
            inner.ready_at = Some(Utc::now());
            self.ready_cv.notify_one();

            trace!("Scan ready with {} points", inner.points.len());

            Ok(PushOutcome::ScanReady)
        } else {
            Ok(PushOutcome::Accumulating)
        }
    }

    /// Take the scan if one is ready, without blocking.
    pub fn try_take(&self) -> Result<Option<Scan>, ScanBufferError> {
        let mut inner = self.lock()?;
        Ok(Self::take_ready(&mut inner))
    }

    /// Wait until a scan is ready and take it.
    ///
    /// The stop flag is polled every `tick`, `None` is returned once it is set and no scan is
    /// ready. Waiting longer than `timeout` is an error.
    pub fn wait_scan(
        &self,
        tick: Duration,
        timeout: Duration,
        stop: &AtomicBool,
    ) -> Result<Option<Scan>, ScanBufferError> {
        let start = Instant::now();
        let mut inner = self.lock()?;

        loop {
            if let Some(scan) = Self::take_ready(&mut inner) {
                return Ok(Some(scan));
            }
            if stop.load(Ordering::Relaxed) {
                return Ok(None);
            }
            if start.elapsed() >= timeout {
                return Err(ScanBufferError::Timeout(timeout.as_secs_f64()));
            }

            let (guard, _) = self
                .ready_cv
                .wait_timeout(inner, tick)
                .map_err(|_| ScanBufferError::Poisoned)?;
            inner = guard;
        }
    }

    /// Number of points dropped because a scan was waiting to be taken.
    pub fn num_dropped(&self) -> Result<usize, ScanBufferError> {
        Ok(self.lock()?.num_dropped)
    }

    fn take_ready(inner: &mut Inner) -> Option<Scan> {
        if !inner.ready {
            return None;
        }

        inner.ready = false;
        Some(Scan {
            points: std::mem::take(&mut inner.points),
            timestamp: inner.ready_at.take().unwrap_or_else(Utc::now),
        })
    }

    fn lock(&self) -> Result<MutexGuard<Inner>, ScanBufferError> {
        self.inner.lock().map_err(|_| ScanBufferError::Poisoned)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::{sync::Arc, thread};

    fn frame(n: usize, range: f64) -> LidarFrame {
        LidarFrame::now(
            (0..n)
                .map(|i| LidarPoint::new(range, i as f64 * 0.01, 0.0))
                .collect(),
        )
    }

    #[test]
    fn test_threshold_is_strict() {
        let buf = ScanBuffer::new(10, 8.0).unwrap();

        assert_eq!(buf.push_frame(&frame(10, 5.0)).unwrap(), PushOutcome::Accumulating);
        assert!(buf.try_take().unwrap().is_none());

        assert_eq!(buf.push_frame(&frame(1, 5.0)).unwrap(), PushOutcome::ScanReady);
        let scan = buf.try_take().unwrap().unwrap();
        assert_eq!(scan.points.len(), 11);

        // Drained after taking
        assert!(buf.try_take().unwrap().is_none());
    }

    #[test]
    fn test_close_points_discarded() {
        let buf = ScanBuffer::new(3, 8.0).unwrap();

        // range^2 of 2^2 = 4 and sqrt(8)^2 = 8 are both gated
        buf.push_frame(&frame(10, 2.0)).unwrap();
        buf.push_frame(&LidarFrame::now(vec![LidarPoint::new(2.0, 2.0, 0.0)]))
            .unwrap();
        assert_eq!(buf.push_frame(&frame(3, 3.0)).unwrap(), PushOutcome::Accumulating);
        assert_eq!(buf.push_frame(&frame(1, 3.0)).unwrap(), PushOutcome::ScanReady);

        let scan = buf.try_take().unwrap().unwrap();
        assert!(scan.points.iter().all(|p| p.range_sq() > 8.0));
        assert_eq!(scan.points.len(), 4);
    }

    #[test]
    fn test_drop_while_ready() {
        let buf = ScanBuffer::new(2, 0.0).unwrap();

        buf.push_frame(&frame(3, 5.0)).unwrap();
        assert_eq!(buf.push_frame(&frame(7, 5.0)).unwrap(), PushOutcome::Dropped);
        assert_eq!(buf.num_dropped().unwrap(), 7);

        let scan = buf.try_take().unwrap().unwrap();
        assert_eq!(scan.points.len(), 3);

        // Accepting again after the hand-off
        assert_eq!(buf.push_frame(&frame(2, 5.0)).unwrap(), PushOutcome::Accumulating);
    }

    #[test]
    fn test_wait_stops() {
        let buf = ScanBuffer::new(5, 0.0).unwrap();
        let stop = AtomicBool::new(true);

        assert!(buf
            .wait_scan(Duration::from_millis(5), Duration::from_secs(1), &stop)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_wait_times_out() {
        let buf = ScanBuffer::new(5, 0.0).unwrap();
        let stop = AtomicBool::new(false);

        buf.push_frame(&frame(2, 5.0)).unwrap();
        assert!(matches!(
            buf.wait_scan(Duration::from_millis(5), Duration::from_millis(30), &stop),
            Err(ScanBufferError::Timeout(_))
        ));
    }

    #[test]
    fn test_wait_across_threads() {
        let buf = Arc::new(ScanBuffer::new(100, 0.0).unwrap());
        let stop = AtomicBool::new(false);

        let producer = {
            let buf = buf.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    buf.push_frame(&frame(10, 5.0)).unwrap();
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        let scan = buf
            .wait_scan(Duration::from_millis(10), Duration::from_secs(5), &stop)
            .unwrap()
            .unwrap();
        assert!(scan.points.len() > 100);

        producer.join().unwrap();
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            ScanBuffer::new(0, 8.0),
            Err(ScanBufferError::ZeroThreshold)
        ));
        assert!(matches!(
            ScanBuffer::new(10, -1.0),
            Err(ScanBufferError::InvalidMinRange(_))
        ));
    }
}
