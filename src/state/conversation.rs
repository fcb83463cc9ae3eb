mod core;
mod session;


pub use session::ChatSession;
