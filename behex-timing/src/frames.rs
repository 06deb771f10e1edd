use std::fmt;

use rand::Rng;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// Duration of a named event in seconds, as written in the settings file:
/// a scalar, a `[min, max]` range drawn uniformly per use, or the
/// `"inf"` marker for wait-for-response intervals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeSpec {
    Fixed(f64),
    Range(f64, f64),
    Infinite,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Scalar(f64),
    Pair([f64; 2]),
    Word(String),
}

impl<'de> Deserialize<'de> for TimeSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTime::deserialize(deserializer)? {
            RawTime::Scalar(v) => Ok(TimeSpec::Fixed(v)),
            RawTime::Pair([lo, hi]) => Ok(TimeSpec::Range(lo, hi)),
            RawTime::Word(w) if w.eq_ignore_ascii_case("inf") => {
                Ok(TimeSpec::Infinite)
            }
            RawTime::Word(w) => Err(serde::de::Error::custom(format!(
                "expected a number, [min, max] or \"inf\", got \"{w}\""
            ))),
        }
    }
}

/// Same shape as [`TimeSpec`] after conversion to whole display frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameSpec {
    Fixed(u32),
    Range(u32, u32),
    Infinite,
}

/// A concrete presentation duration. `Infinite` is the sentinel for
/// "until response" and compares unequal to every finite count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frames {
    Finite(u32),
    Infinite,
}

impl Frames {
    pub fn is_infinite(&self) -> bool {
        matches!(self, Frames::Infinite)
    }
}

impl fmt::Display for Frames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frames::Finite(n) => write!(f, "{n}"),
            Frames::Infinite => f.write_str("inf"),
        }
    }
}

/// Seconds-based timing table, in settings-file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeTable(Vec<(String, TimeSpec)>);

impl TimeTable {
    pub fn new() -> Self {
        TimeTable(Vec::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: TimeSpec) {
        self.0.push((name.into(), spec));
    }

    pub fn get(&self, name: &str) -> Option<TimeSpec> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| *s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TimeSpec)> {
        self.0.iter().map(|(n, s)| (n.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

struct TimeTableVisitor;

impl<'de> Visitor<'de> for TimeTableVisitor {
    type Value = TimeTable;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of event names to durations")
    }

    fn visit_map<A>(self, mut access: A) -> Result<TimeTable, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut table = TimeTable::new();
        while let Some((name, spec)) = access.next_entry::<String, TimeSpec>()? {
            table.insert(name, spec);
        }
        Ok(table)
    }
}

impl<'de> Deserialize<'de> for TimeTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(TimeTableVisitor)
    }
}

/// Frame-based timing table, read-only once the run starts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameTable(Vec<(String, FrameSpec)>);

impl FrameTable {
    pub fn get(&self, name: &str) -> Option<FrameSpec> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| *s)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FrameSpec)> {
        self.0.iter().map(|(n, s)| (n.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve a named duration, drawing a uniform integer (inclusive of
    /// both bounds) for range entries.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        name: &str,
        rng: &mut R,
    ) -> Option<Frames> {
        Some(match self.get(name)? {
            FrameSpec::Fixed(n) => Frames::Finite(n),
            FrameSpec::Range(lo, hi) => {
                Frames::Finite(rng.random_range(lo..=hi))
            }
            FrameSpec::Infinite => Frames::Infinite,
        })
    }
}

/// Round to the nearest integer, ties to even - so that e.g. a 16.67 ms
/// frame splits 0.5-frame ties without a systematic upward bias. This is
/// the documented rounding rule for all seconds-to-frames conversion.
fn round_half_even(x: f64) -> i64 {
    let floor = x.floor();
    let diff = x - floor;
    if diff > 0.5 {
        floor as i64 + 1
    } else if diff < 0.5 {
        floor as i64
    } else if (floor as i64) % 2 == 0 {
        floor as i64
    } else {
        floor as i64 + 1
    }
}

fn to_frames(seconds: f64, frame_time: f64) -> u32 {
    round_half_even(seconds / frame_time).max(0) as u32
}

/// Convert every entry of a seconds-based timing table to whole display
/// frames. Scalars round half-to-even, ranges convert element-wise, and
/// the infinite marker passes through. Key order and completeness are
/// preserved.
pub fn seconds_to_frames(times: &TimeTable, frame_time: f64) -> FrameTable {
    let entries = times
        .iter()
        .map(|(name, spec)| {
            let frames = match spec {
                TimeSpec::Fixed(s) => FrameSpec::Fixed(to_frames(s, frame_time)),
                TimeSpec::Range(lo, hi) => FrameSpec::Range(
                    to_frames(lo, frame_time),
                    to_frames(hi, frame_time),
                ),
                TimeSpec::Infinite => FrameSpec::Infinite,
            };
            (name.to_string(), frames)
        })
        .collect();
    FrameTable(entries)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(round_half_even(0.5), 0);
        assert_eq!(round_half_even(1.5), 2);
        assert_eq!(round_half_even(2.5), 2);
        assert_eq!(round_half_even(3.5), 4);
        assert_eq!(round_half_even(2.4), 2);
        assert_eq!(round_half_even(2.6), 3);
    }

    #[test]
    fn conversion_preserves_order_and_keys() {
        let mut times = TimeTable::new();
        times.insert("fixation", TimeSpec::Fixed(0.3));
        times.insert("stim", TimeSpec::Range(0.2, 0.4));
        times.insert("probe", TimeSpec::Infinite);
        let frames = seconds_to_frames(&times, 0.01);
        let names: Vec<_> = frames.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["fixation", "stim", "probe"]);
        assert_eq!(frames.get("fixation"), Some(FrameSpec::Fixed(30)));
        assert_eq!(frames.get("stim"), Some(FrameSpec::Range(20, 40)));
        assert_eq!(frames.get("probe"), Some(FrameSpec::Infinite));
    }

    #[test]
    fn conversion_stays_within_one_frame() {
        let frame_time = 1.0 / 60.0;
        let mut times = TimeTable::new();
        times.insert("a", TimeSpec::Fixed(0.5));
        times.insert("b", TimeSpec::Range(0.1, 1.234));
        let frames = seconds_to_frames(&times, frame_time);
        let check = |n: u32, seconds: f64| {
            assert!((n as f64 * frame_time - seconds).abs() <= frame_time);
        };
        match frames.get("a").unwrap() {
            FrameSpec::Fixed(n) => check(n, 0.5),
            other => panic!("unexpected {other:?}"),
        }
        match frames.get("b").unwrap() {
            FrameSpec::Range(lo, hi) => {
                check(lo, 0.1);
                check(hi, 1.234);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fixed_entries_sample_exactly() {
        let mut times = TimeTable::new();
        times.insert("fixation", TimeSpec::Fixed(0.3));
        let frames = seconds_to_frames(&times, 0.01);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(
                frames.sample("fixation", &mut rng),
                Some(Frames::Finite(30))
            );
        }
    }

    #[test]
    fn range_entries_sample_inclusive_bounds() {
        let mut times = TimeTable::new();
        times.insert("feedback", TimeSpec::Range(0.2, 0.4));
        let frames = seconds_to_frames(&times, 0.01);
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen_lo = false;
        let mut seen_hi = false;
        for _ in 0..2000 {
            match frames.sample("feedback", &mut rng).unwrap() {
                Frames::Finite(n) => {
                    assert!((20..=40).contains(&n));
                    seen_lo |= n == 20;
                    seen_hi |= n == 40;
                }
                Frames::Infinite => panic!("finite range sampled infinite"),
            }
        }
        assert!(seen_lo && seen_hi);
    }

    #[test]
    fn timespec_parses_all_shapes() {
        let table: TimeTable = serde_json::from_str(
            r#"{"fixation": 0.75, "mask": [0.1, 0.2], "probe": "inf"}"#,
        )
        .unwrap();
        assert_eq!(table.get("fixation"), Some(TimeSpec::Fixed(0.75)));
        assert_eq!(table.get("mask"), Some(TimeSpec::Range(0.1, 0.2)));
        assert_eq!(table.get("probe"), Some(TimeSpec::Infinite));
        assert!(serde_json::from_str::<TimeTable>(r#"{"x": "forever"}"#).is_err());
    }
}
