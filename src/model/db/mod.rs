pub mod election;
pub mod registry;
