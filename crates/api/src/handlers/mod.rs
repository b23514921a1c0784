pub mod conversations;
pub mod push;
pub mod slots;
