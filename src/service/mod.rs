pub mod dialog;
pub mod free_days;
pub mod keyboards;
pub mod reminder_time;
