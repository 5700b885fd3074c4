pub mod db;
pub mod listing;
pub mod pipeline;
pub mod providers;
pub mod scoring;
pub mod taste;
