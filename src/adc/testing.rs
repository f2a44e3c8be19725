//! An in-memory HX711 that answers the real clock/data protocol.

use std::{
    cell::RefCell,
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use super::{AdcLines, DATA_BITS};

#[derive(Default)]
struct State {
    queued: VecDeque<u32>,
    steady: Option<u32>,
    shifting: Option<u32>,
    clock: bool,
    pulses: u32,
    finished: Vec<u32>,
}

impl State {
    fn has_conversion(&self) -> bool {
        self.steady.is_some() || !self.queued.is_empty()
    }

    fn finish_read(&mut self) {
        if self.pulses > DATA_BITS && !self.clock {
            self.finished.push(self.pulses);
            self.pulses = 0;
            self.shifting = None;
        }
    }
}

pub(crate) struct SimulatedConverter {
    state: RefCell<State>,
}

impl SimulatedConverter {
    /// Serves each code once, then never becomes ready again.
    pub fn new(codes: impl IntoIterator<Item = u32>) -> Self {
        Self {
            state: RefCell::new(State {
                queued: codes.into_iter().collect(),
                ..State::default()
            }),
        }
    }

    /// Serves the same code forever.
    pub fn steady(code: u32) -> Self {
        Self {
            state: RefCell::new(State {
                steady: Some(code),
                ..State::default()
            }),
        }
    }

    /// Total clock pulses seen by each completed read.
    pub fn pulse_counts(&self) -> Vec<u32> {
        let mut state = self.state.borrow_mut();
        state.finish_read();
        state.finished.clone()
    }

    pub fn reads(&self) -> usize {
        self.pulse_counts().len()
    }

    pub fn clock_is_high(&self) -> bool {
        self.state.borrow().clock
    }
}

impl AdcLines for SimulatedConverter {
    fn set_clock(&mut self, high: bool) {
        let state = self.state.get_mut();
        if high && !state.clock {
            if state.pulses == 0 {
                state.shifting = match state.steady {
                    Some(code) => Some(code),
                    None => state.queued.pop_front(),
                };
            }
            state.pulses += 1;
        }
        state.clock = high;
    }

    fn data_is_high(&self) -> bool {
        let mut state = self.state.borrow_mut();
        state.finish_read();

        match (state.pulses, state.shifting) {
            (0, _) => !state.has_conversion(),
            (pulses, Some(code)) if pulses <= DATA_BITS => {
                code & (1 << (DATA_BITS - pulses)) != 0
            }
            _ => true,
        }
    }
}

/// A converter whose data line stays high until the returned flag is set,
/// after which every read clocks out zero.
pub(crate) struct StalledConverter {
    released: Arc<AtomicBool>,
}

impl StalledConverter {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        (
            Self {
                released: released.clone(),
            },
            released,
        )
    }
}

impl AdcLines for StalledConverter {
    fn set_clock(&mut self, _high: bool) {}

    fn data_is_high(&self) -> bool {
        !self.released.load(Ordering::SeqCst)
    }
}
