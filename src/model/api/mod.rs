pub mod dump;
pub mod poll;
