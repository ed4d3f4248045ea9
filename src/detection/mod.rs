pub mod brute_force;
pub mod classifier;
pub mod ip_extractor;
pub mod timestamp;

pub use brute_force::BruteForceDetector;
pub use classifier::FailureClassifier;
pub use ip_extractor::extract_ip;
pub use timestamp::{parse_log_time, ParseError};
