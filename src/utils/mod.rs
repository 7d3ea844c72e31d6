pub mod dates;
pub mod email_index;
pub mod user_locks;
