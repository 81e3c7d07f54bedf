use std::fmt;

use crate::error::Error;
use crate::models::candidate::Candidate;

/// Reaction emoji offered for each result, in display order.
pub const SELECTION_EMOJIS: [&str; 5] = ["1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣"];

/// Upper bound on how many candidates a result set can hold.
pub const MAX_RESULTS: usize = SELECTION_EMOJIS.len();

/// A keycap digit the user reacts with to pick a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionToken(usize);

impl SelectionToken {
    /// Maps a reaction emoji back to its token. `None` for anything else.
    pub fn from_emoji(emoji: &str) -> Option<Self> {
        SELECTION_EMOJIS
            .iter()
            .position(|candidate| *candidate == emoji)
            .map(SelectionToken)
    }

    pub fn emoji(&self) -> &'static str {
        SELECTION_EMOJIS[self.0]
    }

    /// Zero-based position of the result this token selects.
    pub fn index(&self) -> usize {
        self.0
    }

    /// One-based number shown next to the result.
    pub fn number(&self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.emoji())
    }
}

/// Bounded, ordered candidates for one selection round. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    candidates: Vec<Candidate>,
}

impl ResultSet {
    /// Builds a set holding at most [`MAX_RESULTS`] candidates.
    pub fn build(candidates: Vec<Candidate>) -> Result<Self, Error> {
        Self::build_with_limit(candidates, MAX_RESULTS)
    }

    /// Like [`ResultSet::build`] but with a smaller cap. Overflow is dropped
    /// silently; `limit` itself is clamped to `1..=MAX_RESULTS`.
    pub fn build_with_limit(mut candidates: Vec<Candidate>, limit: usize) -> Result<Self, Error> {
        if candidates.is_empty() {
            return Err(Error::EmptyResult);
        }
        candidates.truncate(limit.clamp(1, MAX_RESULTS));
        Ok(Self { candidates })
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn token_for(&self, index: usize) -> Result<SelectionToken, Error> {
        if index < self.candidates.len() {
            Ok(SelectionToken(index))
        } else {
            Err(Error::IndexOutOfRange(format!(
                "index {index} outside result set of {}",
                self.candidates.len()
            )))
        }
    }

    pub fn candidate_for(&self, token: SelectionToken) -> Result<&Candidate, Error> {
        self.candidates.get(token.0).ok_or_else(|| {
            Error::IndexOutOfRange(format!(
                "token {token} outside result set of {}",
                self.candidates.len()
            ))
        })
    }

    pub fn contains(&self, token: SelectionToken) -> bool {
        token.0 < self.candidates.len()
    }

    /// Tokens in display order; exactly one per candidate.
    pub fn tokens(&self) -> Vec<SelectionToken> {
        (0..self.candidates.len()).map(SelectionToken).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SelectionToken, &Candidate)> {
        self.candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (SelectionToken(i), c))
    }
}

/// The user's resolved pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub token: SelectionToken,
    pub candidate: Candidate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| Candidate::new(format!("vid{i}"), format!("Title {i}"), "desc"))
            .collect()
    }

    #[test]
    fn tokens_and_candidates_form_a_bijection() {
        for n in 1..=MAX_RESULTS {
            let set = ResultSet::build(candidates(n)).unwrap();
            assert_eq!(set.tokens().len(), set.len());
            for i in 0..n {
                let token = set.token_for(i).unwrap();
                assert_eq!(token.index(), i);
                assert_eq!(set.candidate_for(token).unwrap().external_id.as_deref(), Some(format!("vid{i}").as_str()));
            }
            let mut emojis: Vec<_> = set.tokens().iter().map(|t| t.emoji()).collect();
            emojis.dedup();
            assert_eq!(emojis.len(), n);
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(ResultSet::build(vec![]), Err(Error::EmptyResult)));
    }

    #[test]
    fn overflow_is_truncated_to_max() {
        let set = ResultSet::build(candidates(8)).unwrap();
        assert_eq!(set.len(), MAX_RESULTS);
        assert_eq!(set.candidates()[4].title, "Title 4");

        let set = ResultSet::build_with_limit(candidates(4), 2).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn out_of_range_lookups_fail() {
        let set = ResultSet::build(candidates(3)).unwrap();
        assert!(matches!(set.token_for(3), Err(Error::IndexOutOfRange(_))));
        let five = SelectionToken::from_emoji("5️⃣").unwrap();
        assert!(!set.contains(five));
        assert!(matches!(set.candidate_for(five), Err(Error::IndexOutOfRange(_))));
    }

    #[test]
    fn emoji_parsing() {
        assert_eq!(SelectionToken::from_emoji("2️⃣").map(|t| t.number()), Some(2));
        assert_eq!(SelectionToken::from_emoji("👍"), None);
        assert_eq!(SelectionToken::from_emoji("2"), None);
    }
}
