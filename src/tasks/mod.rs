pub mod action;
pub mod coordinator;
pub mod queue;
pub mod scheduler;
pub mod source;

#[cfg(test)]
pub mod testing;
