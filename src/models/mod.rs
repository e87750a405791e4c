pub mod record;
pub mod task;
pub mod validation;
