//! Test cases and the suite settings shared by every runner of one run.
mod suite;

pub use suite::{TestCase, TestSuite};
