pub mod queue;
pub mod track;
pub mod vote;
