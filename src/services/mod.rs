pub mod analyzer;
pub mod calculator;
pub mod generator;
pub mod matcher;
pub mod notifier;
pub mod parser;
pub mod persister;

pub use analyzer::{Analyzer, Pricing};
pub use calculator::{calculate_score, score_message};
pub use generator::{FeedbackOutcome, Generator};
pub use matcher::{Matcher, StudentMatch};
pub use notifier::{BatchNotifier, WebhookNotifier};
pub use parser::parse_submission;
pub use persister::{EvaluationStore, JsonFileStore, Persister};
