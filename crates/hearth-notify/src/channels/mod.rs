pub mod console;
pub mod email;
pub mod file;
pub mod webhook;

pub use console::ConsoleChannel;
pub use email::EmailChannel;
pub use file::FileChannel;
pub use webhook::WebhookChannel;
