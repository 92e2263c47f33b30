pub mod health;
pub mod jobs;
pub mod monitor;
pub mod reaper;
pub mod webhook;
