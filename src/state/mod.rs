pub mod history;
pub mod manager;
pub mod types;
