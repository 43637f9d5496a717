pub mod action;
pub mod queue;
pub mod worker;
