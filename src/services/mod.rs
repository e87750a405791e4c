pub mod cache;
pub mod job;
pub mod queue;
pub mod store;
pub mod submission;
pub mod validator;
