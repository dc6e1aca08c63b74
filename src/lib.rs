//! ngramlab - n-gram frequency statistics for word-confusion detection
//!
//! Text is counted into three persistent stores (1-, 2- and 3-grams),
//! the counts answer backoff pseudo-probability queries, and confusion
//! pairs such as "there"/"their" are evaluated against example sentences
//! to find the factor at which a probability-based rule is precise enough.

pub mod config;
pub mod confusion;
pub mod corpus;
pub mod ingest;
pub mod ngram;
pub mod probability;
pub mod store;
pub mod tokenize;
