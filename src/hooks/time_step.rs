/// The named tick type a [`crate::hooks::Hook`] is scheduled against (§3 GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeScale {
    Iteration,
    Epoch,
    Start,
    Stop,
}

/// A `(time_scale, interval, live_time)` schedule. `live_time == -1` means "forever".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStep {
    pub scale: TimeScale,
    pub interval: i64,
    pub live_time: i64,
}

impl TimeStep {
    pub fn new(scale: TimeScale, interval: i64, live_time: i64) -> Self {
        TimeStep { scale, interval, live_time }
    }

    pub fn forever(scale: TimeScale, interval: i64) -> Self {
        TimeStep::new(scale, interval, -1)
    }
}

/// A hook's live countdown copy of its [`TimeStep`], created the first time the
/// scheduler ejects events for that hook's scale (§4.3 "time-scale event ejection").
#[derive(Debug, Clone, Copy)]
pub struct LocalTimeStep {
    time_step: TimeStep,
    local_interval: i64,
    local_live_time: i64,
}

impl LocalTimeStep {
    pub fn new(time_step: TimeStep) -> Self {
        LocalTimeStep {
            time_step,
            local_interval: time_step.interval,
            local_live_time: time_step.live_time,
        }
    }

    pub fn scale(&self) -> TimeScale {
        self.time_step.scale
    }

    pub fn is_expired(&self) -> bool {
        self.local_live_time == 0
    }

    /// Advance one tick of this hook's scale. Returns whether the hook fires this
    /// tick. Decrements `local_interval`; on hitting zero, fires, decrements
    /// `local_live_time` (if finite), and resets `local_interval`.
    pub fn tick(&mut self) -> bool {
        if self.is_expired() {
            return false;
        }
        self.local_interval -= 1;
        if self.local_interval != 0 {
            return false;
        }
        if self.local_live_time > 0 {
            self.local_live_time -= 1;
        }
        self.local_interval = self.time_step.interval;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_at_interval_boundaries_then_expires() {
        let mut local = LocalTimeStep::new(TimeStep::new(TimeScale::Iteration, 3, 2));
        let fires: Vec<bool> = (1..=9).map(|_| local.tick()).collect();
        // fires at tick 3, 6 only (boundary 1); then expired
        assert_eq!(
            fires,
            vec![false, false, true, false, false, true, false, false, false]
        );
        assert!(local.is_expired());
    }

    #[test]
    fn forever_hook_never_expires() {
        let mut local = LocalTimeStep::new(TimeStep::forever(TimeScale::Epoch, 1));
        for _ in 0..100 {
            assert!(local.tick());
        }
        assert!(!local.is_expired());
    }
}
