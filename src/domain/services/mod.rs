pub mod delivery;
pub mod recovery;
pub mod schedule;
