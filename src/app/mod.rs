pub mod dispatch;
pub mod render;
pub mod session;

pub use dispatch::dispatch;
pub use session::Session;
