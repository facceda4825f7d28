use std::collections::HashMap;

/// Outcome of classifying one invalid record's comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No comment was recorded. Tallied under the blank bucket.
    Uncommented,
    /// A canonical category, or the raw comment when no rule matched.
    Category(String),
    /// Provisionally invalid until the nightly acceptance batch; not an error.
    PendingAcceptance,
}

impl Classification {
    /// Key used in error tallies. `None` means the record is not tallied.
    pub fn tally_key(&self) -> Option<&str> {
        match self {
            Self::Uncommented => Some(""),
            Self::Category(label) => Some(label),
            Self::PendingAcceptance => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleOutcome {
    Label(&'static str),
    Exclude,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    token: &'static str,
    outcome: RuleOutcome,
}

/// Evaluated top to bottom, first match wins.
const RULES: &[Rule] = &[
    Rule {
        token: "expected",
        outcome: RuleOutcome::Label("Formatting error"),
    },
    Rule {
        token: "not registered",
        outcome: RuleOutcome::Label("Not registered"),
    },
    Rule {
        token: "question",
        outcome: RuleOutcome::Label("Entry error for a specific question"),
    },
    Rule {
        token: "school",
        outcome: RuleOutcome::Label("School ID error"),
    },
    Rule {
        token: "logical",
        outcome: RuleOutcome::Label("Logical error"),
    },
    Rule {
        token: "accepted",
        outcome: RuleOutcome::Exclude,
    },
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, raw_comment: Option<&str>) -> Classification {
        let comment = match raw_comment {
            Some(comment) if !comment.trim().is_empty() => comment,
            _ => return Classification::Uncommented,
        };

        let lowered = comment.to_lowercase();
        match RULES.iter().find(|rule| lowered.contains(rule.token)) {
            Some(Rule {
                outcome: RuleOutcome::Label(label),
                ..
            }) => Classification::Category((*label).to_string()),
            Some(Rule {
                outcome: RuleOutcome::Exclude,
                ..
            }) => Classification::PendingAcceptance,
            None => Classification::Category(comment.to_string()),
        }
    }

    /// Classifies every comment and tallies the countable ones.
    pub fn tally<'a, I>(&self, comments: I) -> ErrorTally
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut tally = ErrorTally::default();
        for comment in comments {
            if let Some(key) = self.classify(comment).tally_key() {
                tally.add(key);
            }
        }
        tally
    }
}

/// Category counts kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorTally {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl ErrorTally {
    pub fn add(&mut self, category: &str) {
        match self.index.get(category) {
            Some(&position) => self.entries[position].1 += 1,
            None => {
                self.index.insert(category.to_string(), self.entries.len());
                self.entries.push((category.to_string(), 1));
            }
        }
    }

    #[cfg(test)]
    pub fn count(&self, category: &str) -> usize {
        self.index
            .get(category)
            .map(|&position| self.entries[position].1)
            .unwrap_or(0)
    }

    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// Highest counts first; equal counts keep first-seen order.
    pub fn top(&self, limit: usize) -> Vec<(String, usize)> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);
        ranked
    }
}
