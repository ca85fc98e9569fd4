pub mod pump;
pub mod receiver;
pub mod sender;
