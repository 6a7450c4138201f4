pub mod constants;
pub mod parser;
pub mod types;
