pub mod capture;
pub mod compare;
pub mod decision;

pub use capture::CaptureBody;
pub use compare::{ComparisonOutcome, compare_bodies};
pub use decision::decide;
