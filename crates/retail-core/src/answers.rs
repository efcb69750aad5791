//! Fixed answer labels for the accompanying multiple-choice questions.

use std::collections::{BTreeMap, BTreeSet};

const ANSWERS: &[(&str, &[&str])] = &[
    ("Q1", &["A", "D"]),
    ("Q2", &["B"]),
    ("Q3", &["A", "B", "C"]),
    ("Q4", &["A", "B"]),
    ("Q5", &["A"]),
];

/// Question identifier → set of selected answer labels.
pub fn conceptual_answers() -> BTreeMap<&'static str, BTreeSet<&'static str>> {
    ANSWERS
        .iter()
        .map(|(question, labels)| (*question, labels.iter().copied().collect()))
        .collect()
}
