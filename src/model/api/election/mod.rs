mod desc;
mod results;
mod spec;

pub use desc::{CandidateDescription, ElectionDescription, WindowDescription};
pub use results::ElectionResults;
pub use spec::{CandidateSpec, ElectionSpec, MetadataPatch, Violation, WindowSpec};
