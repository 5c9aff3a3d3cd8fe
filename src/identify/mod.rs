pub mod parser;
pub mod phases;
pub mod prompt;
pub mod score;
