pub mod cron;
pub mod reminders;
