pub mod answers;
pub mod handlers;
pub mod session;
pub mod workflow;
