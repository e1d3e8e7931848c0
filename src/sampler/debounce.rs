// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Per-channel debounce state machine.
//!
//! The raw level is only trusted once it has held for the settle duration. Time is passed
//! in by the caller so the machine can be driven with synthetic sample sequences.

use std::time::{Duration, Instant};

use crate::gpio::Level;

/// A confirmed change of the debounced level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    /// How long the raw level must hold before it is confirmed.
    settle: Duration,
    /// The nominal time between samples. A change is never backdated further than this.
    poll_interval: Duration,
    /// The raw level seen on the previous sample.
    last_raw: Level,
    /// When the previous sample was taken. None before the first sample.
    last_sample_at: Option<Instant>,
    /// The last instant the raw level was known to be different from `last_raw`.
    stable_since: Option<Instant>,
    /// The debounced level.
    confirmed: Level,
}

impl Debouncer {
    /// Creates a debouncer that starts out released (a pulled-up input reads high).
    pub fn new(settle: Duration, poll_interval: Duration) -> Debouncer {
        Debouncer {
            settle,
            poll_interval,
            last_raw: Level::High,
            last_sample_at: None,
            stable_since: None,
            confirmed: Level::High,
        }
    }

    /// Feeds one raw sample taken at `now`. Returns the edge if this sample confirmed a
    /// new level.
    ///
    /// A change is never confirmed on the sample that introduced it. The level counts as
    /// stable from the previous sample onwards, but no earlier than one poll interval
    /// before the change was seen: polled every 10ms with a 30ms settle, a press first
    /// seen on one poll is confirmed two polls later, however long the gap before it.
    pub fn update(&mut self, raw: Level, now: Instant) -> Option<Edge> {
        let previous_sample = self.last_sample_at.replace(now);

        if raw != self.last_raw {
            self.last_raw = raw;
            self.stable_since = Some(self.backdate(previous_sample, now));
            return None;
        }

        if raw == self.confirmed {
            return None;
        }

        let stable_since = *self.stable_since.get_or_insert(now);
        if now.saturating_duration_since(stable_since) < self.settle {
            return None;
        }

        self.confirmed = raw;
        Some(if raw.is_pressed() {
            Edge::Pressed
        } else {
            Edge::Released
        })
    }

    /// Returns the debounced level.
    pub fn confirmed(&self) -> Level {
        self.confirmed
    }

    /// Where a change first seen at `now` starts counting from. A stalled loop or a run
    /// of failed reads leaves a long gap since the previous sample, and the new level is
    /// only known for the last poll interval of it.
    fn backdate(&self, previous_sample: Option<Instant>, now: Instant) -> Instant {
        let Some(previous_sample) = previous_sample else {
            return now;
        };
        match now.checked_sub(self.poll_interval) {
            Some(earliest) => previous_sample.max(earliest),
            None => previous_sample,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(10);
    const SETTLE: Duration = Duration::from_millis(30);

    /// Feeds the levels at POLL spacing, starting one poll after a released sample at t=0.
    /// Returns the 1-based poll numbers at which a press edge fired.
    fn press_polls(levels: &[Level]) -> Vec<usize> {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(SETTLE, POLL);
        assert_eq!(None, debouncer.update(Level::High, start));

        levels
            .iter()
            .enumerate()
            .filter_map(|(i, level)| {
                let now = start + POLL * (i as u32 + 1);
                match debouncer.update(*level, now) {
                    Some(Edge::Pressed) => Some(i + 1),
                    _ => None,
                }
            })
            .collect()
    }

    fn levels(pattern: &str) -> Vec<Level> {
        pattern
            .chars()
            .map(|c| if c == 'L' { Level::Low } else { Level::High })
            .collect()
    }

    #[test]
    fn test_press_confirmed_after_settle() {
        // Low for five polls: the press is confirmed on the third.
        assert_eq!(vec![3], press_polls(&levels("LLLLL")));
    }

    #[test]
    fn test_single_poll_glitch_is_ignored() {
        assert!(press_polls(&levels("LHHHHH")).is_empty());
    }

    #[test]
    fn test_short_press_is_dropped() {
        // Two polls low is 20ms, under the settle duration.
        assert!(press_polls(&levels("LLHHHH")).is_empty());
    }

    #[test]
    fn test_chatter_then_press() {
        // Contact bounce on the way down, then a clean hold.
        assert_eq!(vec![7], press_polls(&levels("LHLHLLLLL")));
    }

    #[test]
    fn test_one_edge_per_press_release_cycle() {
        assert_eq!(vec![3, 13], press_polls(&levels("LLLLLHHHHHLLLLHHH")));
    }

    #[test]
    fn test_short_release_glitch_keeps_press() {
        // A brief high blip while held is bounce, not a release and re-press.
        assert_eq!(vec![3], press_polls(&levels("LLLLHLLLLL")));
    }

    #[test]
    fn test_release_edge() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(SETTLE, POLL);
        let mut edges = Vec::new();
        for (i, level) in levels("HLLLLHHHH").into_iter().enumerate() {
            if let Some(edge) = debouncer.update(level, start + POLL * i as u32) {
                edges.push(edge);
            }
        }
        assert_eq!(vec![Edge::Pressed, Edge::Released], edges);
        assert_eq!(Level::High, debouncer.confirmed());
    }

    #[test]
    fn test_uneven_polling_uses_timestamps() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(SETTLE, POLL);
        debouncer.update(Level::High, start);
        assert_eq!(None, debouncer.update(Level::Low, start + Duration::from_millis(5)));
        // A late poll: the level has been low since at least t=5ms, held since t=0.
        assert_eq!(
            Some(Edge::Pressed),
            debouncer.update(Level::Low, start + Duration::from_millis(40))
        );
    }

    #[test]
    fn test_stalled_poll_does_not_backdate_change() {
        let start = Instant::now();
        let at = |ms: u64| start + Duration::from_millis(ms);

        // The loop stalls for 200ms, then sees a 10ms glitch.
        let mut debouncer = Debouncer::new(SETTLE, POLL);
        debouncer.update(Level::High, at(0));
        assert_eq!(None, debouncer.update(Level::Low, at(200)));
        assert_eq!(None, debouncer.update(Level::Low, at(210)));
        assert_eq!(None, debouncer.update(Level::High, at(220)));
        assert_eq!(Level::High, debouncer.confirmed());

        // A real press after the same stall still confirms on its third poll.
        let mut debouncer = Debouncer::new(SETTLE, POLL);
        debouncer.update(Level::High, at(0));
        assert_eq!(None, debouncer.update(Level::Low, at(200)));
        assert_eq!(None, debouncer.update(Level::Low, at(210)));
        assert_eq!(Some(Edge::Pressed), debouncer.update(Level::Low, at(220)));
    }

    #[test]
    fn test_irregular_spacing_never_confirms_short_runs() {
        const GAPS_MS: [u64; 12] = [10, 3, 45, 10, 200, 7, 25, 10, 60, 15, 1, 30];
        let len = 10;

        for rotation in 0..GAPS_MS.len() {
            for bits in 0u32..(1 << len) {
                let start = Instant::now();
                let mut debouncer = Debouncer::new(SETTLE, POLL);
                debouncer.update(Level::High, start);

                let mut now = start;
                let mut previous = Level::High;
                let mut run_start = start;
                for i in 0..len {
                    let level = if bits & (1 << i) != 0 {
                        Level::Low
                    } else {
                        Level::High
                    };
                    now += Duration::from_millis(GAPS_MS[(i + rotation) % GAPS_MS.len()]);
                    let first_of_run = level != previous;
                    if first_of_run {
                        run_start = now;
                        previous = level;
                    }
                    let observed = now - run_start;

                    if let Some(edge) = debouncer.update(level, now) {
                        assert!(
                            !first_of_run,
                            "edge on first sample, sequence {:010b} rotation {}",
                            bits, rotation
                        );
                        assert_eq!(level.is_pressed(), edge == Edge::Pressed);
                        // Only one poll interval before the first sample may be counted.
                        assert!(
                            observed + POLL >= SETTLE,
                            "edge after {:?}, sequence {:010b} rotation {}",
                            observed,
                            bits,
                            rotation
                        );
                    }
                    if observed >= SETTLE {
                        assert_eq!(level, debouncer.confirmed());
                    }
                }
            }
        }
    }

    /// Counts press edges the way the debounced level is defined: a maximal run of equal
    /// samples that lasts at least the settle duration replaces the confirmed level.
    fn reference_presses(levels: &[Level]) -> usize {
        let needed = (SETTLE.as_millis() / POLL.as_millis()) as usize;
        let mut confirmed = Level::High;
        let mut presses = 0;
        let mut i = 0;
        while i < levels.len() {
            let level = levels[i];
            let run = levels[i..].iter().take_while(|l| **l == level).count();
            if run >= needed && level != confirmed {
                confirmed = level;
                if level.is_pressed() {
                    presses += 1;
                }
            }
            i += run;
        }
        presses
    }

    #[test]
    fn test_matches_reference_for_all_short_sequences() {
        let len = 12;
        for bits in 0u32..(1 << len) {
            let sequence: Vec<Level> = (0..len)
                .map(|i| {
                    if bits & (1 << i) != 0 {
                        Level::Low
                    } else {
                        Level::High
                    }
                })
                .collect();

            assert_eq!(
                reference_presses(&sequence),
                press_polls(&sequence).len(),
                "sequence {:012b}",
                bits
            );
        }
    }
}
