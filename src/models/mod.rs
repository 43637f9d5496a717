pub mod calendar;
pub mod task;
pub mod user;
