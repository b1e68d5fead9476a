//! Placement policies.
//!
//! A [`Strategy`] only decides which free slot satisfies a request; the
//! splitting and bookkeeping around it are shared by every policy and live in
//! [`Allocator`](crate::alloc::Allocator).

use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::free_list::Candidate;

pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Picks one candidate with `size >= request`, or `None` if nothing fits.
    fn select<I>(&self, candidates: I, request: usize) -> Option<Candidate>
    where
        I: Iterator<Item = Candidate>;
}

/// First slot in list order that fits. Stops scanning on the first hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstFit;

/// Smallest slot that fits; the earliest one wins a tie.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BestFit;

/// Largest slot that fits; the earliest one wins a tie.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorstFit;

impl Strategy for FirstFit {
    fn name(&self) -> &'static str {
        "first-fit"
    }

    fn select<I>(&self, mut candidates: I, request: usize) -> Option<Candidate>
    where
        I: Iterator<Item = Candidate>,
    {
        candidates.find(|c| c.size >= request)
    }
}

impl Strategy for BestFit {
    fn name(&self) -> &'static str {
        "best-fit"
    }

    fn select<I>(&self, candidates: I, request: usize) -> Option<Candidate>
    where
        I: Iterator<Item = Candidate>,
    {
        // an exact fit cannot be beaten
        let mut best: Option<Candidate> = None;
        for c in candidates.filter(|c| c.size >= request) {
            if best.is_none_or(|b| c.size < b.size) {
                best = Some(c);
                if c.size == request {
                    break;
                }
            }
        }
        best
    }
}

impl Strategy for WorstFit {
    fn name(&self) -> &'static str {
        "worst-fit"
    }

    fn select<I>(&self, candidates: I, request: usize) -> Option<Candidate>
    where
        I: Iterator<Item = Candidate>,
    {
        candidates
            .filter(|c| c.size >= request)
            .fold(None, |worst: Option<Candidate>, c| match worst {
                Some(w) if w.size >= c.size => Some(w),
                _ => Some(c),
            })
    }
}

/// Run time choice between the three policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Policy {
    FirstFit,
    BestFit,
    #[default]
    WorstFit,
}

impl Policy {
    pub const ALL: [Policy; 3] = [Policy::FirstFit, Policy::BestFit, Policy::WorstFit];
}

impl Strategy for Policy {
    fn name(&self) -> &'static str {
        match self {
            Policy::FirstFit => FirstFit.name(),
            Policy::BestFit => BestFit.name(),
            Policy::WorstFit => WorstFit.name(),
        }
    }

    fn select<I>(&self, candidates: I, request: usize) -> Option<Candidate>
    where
        I: Iterator<Item = Candidate>,
    {
        match self {
            Policy::FirstFit => FirstFit.select(candidates, request),
            Policy::BestFit => BestFit.select(candidates, request),
            Policy::WorstFit => WorstFit.select(candidates, request),
        }
    }
}

impl Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown policy {0:?}, expected first, best or worst")]
pub struct ParsePolicyError(String);

impl FromStr for Policy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" | "first-fit" | "first_fit" => Ok(Policy::FirstFit),
            "best" | "best-fit" | "best_fit" => Ok(Policy::BestFit),
            "worst" | "worst-fit" | "worst_fit" => Ok(Policy::WorstFit),
            _ => Err(ParsePolicyError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotRef;
    use test_log::test;

    /// Candidates in list order, one 64 byte stride apart.
    fn list(sizes: &[usize]) -> Vec<Candidate> {
        let slots: Vec<_> = (0..sizes.len()).map(|i| SlotRef::new(0, i * 64)).collect();
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| Candidate {
                prev: i.checked_sub(1).map(|p| slots[p]),
                slot: slots[i],
                size,
            })
            .collect()
    }

    fn pick<S: Strategy>(strategy: S, sizes: &[usize], request: usize) -> Option<usize> {
        let candidates = list(sizes);
        strategy
            .select(candidates.iter().copied(), request)
            .map(|c| candidates.iter().position(|x| *x == c).unwrap())
    }

    #[test]
    fn best_fit_takes_smallest_that_fits() {
        assert_eq!(pick(BestFit, &[16, 64, 32], 24), Some(2));
    }

    #[test]
    fn worst_fit_takes_largest_that_fits() {
        assert_eq!(pick(WorstFit, &[16, 64, 32], 24), Some(1));
    }

    #[test]
    fn first_fit_takes_first_that_fits() {
        assert_eq!(pick(FirstFit, &[64, 16, 32], 24), Some(0));
        assert_eq!(pick(FirstFit, &[16, 32, 64], 24), Some(1));
    }

    #[test]
    fn ties_go_to_the_earliest_slot() {
        assert_eq!(pick(BestFit, &[64, 32, 48, 32], 24), Some(1));
        assert_eq!(pick(WorstFit, &[16, 64, 32, 64], 24), Some(1));
    }

    #[test]
    fn nothing_fits() {
        for policy in Policy::ALL {
            assert_eq!(pick(policy, &[8, 16], 24), None, "{policy}");
            assert_eq!(pick(policy, &[], 8), None, "{policy}");
        }
    }

    #[test]
    fn exact_fit_is_eligible() {
        for policy in Policy::ALL {
            assert_eq!(pick(policy, &[8, 24], 24), Some(1), "{policy}");
        }
    }

    #[test]
    fn first_fit_stops_scanning() {
        let candidates = list(&[8, 32, 64, 128]);
        let mut visited = 0;
        let found = FirstFit.select(
            candidates.iter().copied().inspect(|_| visited += 1),
            24,
        );
        assert_eq!(found.map(|c| c.size), Some(32));
        assert_eq!(visited, 2);
    }

    #[test]
    fn policy_delegates() {
        let sizes = [16, 64, 32];
        assert_eq!(pick(Policy::FirstFit, &sizes, 24), pick(FirstFit, &sizes, 24));
        assert_eq!(pick(Policy::BestFit, &sizes, 24), pick(BestFit, &sizes, 24));
        assert_eq!(pick(Policy::WorstFit, &sizes, 24), pick(WorstFit, &sizes, 24));
    }

    #[test]
    fn policy_parses_and_displays() {
        assert_eq!("first".parse(), Ok(Policy::FirstFit));
        assert_eq!("Best-Fit".parse(), Ok(Policy::BestFit));
        assert_eq!("worst_fit".parse(), Ok(Policy::WorstFit));
        assert!("next".parse::<Policy>().is_err());
        for policy in Policy::ALL {
            assert_eq!(policy.to_string().parse(), Ok(policy));
        }
    }
}
