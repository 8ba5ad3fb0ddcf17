//! Chronologically ordered keys in the hosted database's push-id format:
//! 8 characters of millisecond timestamp followed by 12 random characters.
//! Keys generated within the same millisecond increment the random part, so
//! they still sort in creation order.

use std::sync::Mutex;

use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

static GENERATOR: PushIdGenerator = PushIdGenerator::new();

pub fn generate() -> String {
    GENERATOR.next()
}

#[derive(Debug)]
struct State {
    last_time: i64,
    last_random: [u8; 12],
}

#[derive(Debug)]
pub struct PushIdGenerator {
    state: Mutex<State>,
}

impl PushIdGenerator {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(State {
                last_time: -1,
                last_random: [0; 12],
            }),
        }
    }

    /// Reads the clock while holding the lock so concurrent callers stay ordered.
    pub fn next(&self) -> String {
        let mut state = self.lock();
        let now = chrono::Utc::now().timestamp_millis();
        Self::next_locked(&mut state, now)
    }

    pub fn next_at(&self, now_millis: i64) -> String {
        let mut state = self.lock();
        Self::next_locked(&mut state, now_millis)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_locked(state: &mut State, now_millis: i64) -> String {
        // A clock that steps backwards must not break ordering.
        let now = now_millis.max(state.last_time).max(0);

        if now == state.last_time {
            for digit in state.last_random.iter_mut().rev() {
                if *digit == 63 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    break;
                }
            }
        } else {
            let mut rng = rand::rng();
            for digit in state.last_random.iter_mut() {
                *digit = rng.random_range(0..64);
            }
        }
        state.last_time = now;

        let mut time_chars = [0u8; 8];
        let mut remaining = now;
        for slot in time_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(remaining % 64) as usize];
            remaining /= 64;
        }

        time_chars
            .iter()
            .copied()
            .chain(state.last_random.iter().map(|&d| PUSH_CHARS[d as usize]))
            .map(char::from)
            .collect()
    }
}

impl Default for PushIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_twenty_url_safe_characters() {
        let id = generate();
        assert_eq!(id.len(), 20);
        assert!(id.bytes().all(|b| PUSH_CHARS.contains(&b)));
    }

    #[test]
    fn ids_in_same_millisecond_keep_order() {
        let generator = PushIdGenerator::new();
        let ids: Vec<String> = (0..50).map(|_| generator.next_at(1_700_000_000_000)).collect();

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert!(ids.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn later_timestamps_sort_after() {
        let generator = PushIdGenerator::new();
        let first = generator.next_at(1_700_000_000_000);
        let second = generator.next_at(1_700_000_000_001);
        assert!(first < second);
        assert_eq!(first[..7], second[..7]);
    }
}
