use crate::config::{DEFAULT_SIMILARITY_CUTOFF, MAX_CANDIDATES};
use similar::TextDiff;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<'a> {
    pub name: &'a str,
    pub score: f64,
}

/// Picks the catalog name closest to a search keyword.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    cutoff: f64,
    limit: usize,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_CUTOFF)
    }
}

impl FuzzyMatcher {
    pub fn new(cutoff: f64) -> Self {
        Self {
            cutoff: cutoff.clamp(0.0, 1.0),
            limit: MAX_CANDIDATES,
        }
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Matching-characters ratio `2M / (len(a) + len(b))` over a char diff,
    /// in `[0, 1]`.
    pub fn similarity(a: &str, b: &str) -> f64 {
        f64::from(TextDiff::from_chars(a, b).ratio())
    }

    /// Up to `limit` candidates at or above the cutoff, best first.
    /// Equal scores are ordered by name, descending, so the result is stable.
    pub fn rank<'a, I>(&self, query: &str, candidates: I) -> Vec<Ranked<'a>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ranked: Vec<Ranked<'a>> = candidates
            .into_iter()
            .map(|name| Ranked {
                name,
                score: Self::similarity(query, name),
            })
            .filter(|r| r.score >= self.cutoff)
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.name.cmp(a.name))
        });
        ranked.truncate(self.limit);
        ranked
    }

    pub fn best<'a, I>(&self, query: &str, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.rank(query, candidates).first().map(|r| r.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_volume_entries_over_unrelated_titles() {
        let names = ["魔法科高校の劣等生1", "魔法科高校の劣等生2", "COOKING MASTER BOY"];
        let m = FuzzyMatcher::default();
        let best = m.best("魔法科高校の劣等生", names).unwrap();
        assert!(best == names[0] || best == names[1]);
        let ranked = m.rank("魔法科高校の劣等生", names);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.name != "COOKING MASTER BOY"));
        assert!(ranked[0].score > 0.85);
    }

    #[test]
    fn nothing_above_cutoff_means_no_match() {
        let m = FuzzyMatcher::new(0.6);
        assert_eq!(m.best("Sword Art Online", ["COOKING MASTER BOY"]), None);
        assert_eq!(m.best("anything", std::iter::empty()), None);
    }

    #[test]
    fn keeps_at_most_three() {
        let names = ["abc1", "abc2", "abc3", "abc4", "abc"];
        let ranked = FuzzyMatcher::default().rank("abc", names);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].name, "abc");
        // ties broken by descending name
        assert_eq!(ranked[1].name, "abc4");
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = "Re：从零开始的异世界生活";
        let b = "Re:从零开始的异世界生活 第三章";
        let (ab, ba) = (FuzzyMatcher::similarity(a, b), FuzzyMatcher::similarity(b, a));
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn long_subtitles_still_match_their_series() {
        let names = ["魔法科高校的劣等生 司波达也暗杀计划①", "COOKING MASTER BOY"];
        let score = FuzzyMatcher::similarity("魔法科高校的劣等生", names[0]);
        assert!((score - 18.0 / 28.0).abs() < 1e-3, "score {score}");
        assert_eq!(FuzzyMatcher::default().best("魔法科高校的劣等生", names), Some(names[0]));
    }
}
