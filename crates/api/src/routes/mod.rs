pub mod conversations;
pub mod health;
pub mod push;
pub mod slots;
