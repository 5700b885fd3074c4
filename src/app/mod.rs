pub mod dispatch;
pub mod interview;
pub mod status;
