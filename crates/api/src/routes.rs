pub mod calls;
pub mod health;
pub mod slots;
pub mod ws;
