pub mod election;
pub mod key;
pub mod tx;
