pub mod buy;
pub mod reset;
pub mod verify;
