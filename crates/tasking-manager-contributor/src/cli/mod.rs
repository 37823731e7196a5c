pub mod console;
pub mod interactive;
