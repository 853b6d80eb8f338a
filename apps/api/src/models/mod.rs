pub mod company;
pub mod job;
pub mod session;
pub mod workflow;
