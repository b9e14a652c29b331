use serde::{Deserialize, Serialize};

/// Monotonic milliseconds on the runtime's own timebase.
///
/// This is deliberately not wall-clock time: drivers map it onto a real clock
/// (tokio) or advance it by hand (simulation, tests).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    pub fn saturating_add(self, ms: u64) -> Self {
        Millis(self.0.saturating_add(ms))
    }

    pub fn since(self, earlier: Millis) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

pub trait Clock {
    fn now(&self) -> Millis;
}

/// Clock that only moves when told to.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Millis,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, ms: u64) -> Millis {
        self.now = self.now.saturating_add(ms);
        self.now
    }

    /// Moves to `t`; never goes backwards.
    pub fn advance_to(&mut self, t: Millis) -> Millis {
        self.now = self.now.max(t);
        self.now
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, Millis};

    #[test]
    fn manual_clock_is_monotonic() {
        let mut c = ManualClock::new();
        assert_eq!(c.advance(150), Millis(150));
        assert_eq!(c.advance_to(Millis(100)), Millis(150));
        assert_eq!(c.advance_to(Millis(400)), Millis(400));
        assert_eq!(c.now().since(Millis(150)), 250);
    }
}
