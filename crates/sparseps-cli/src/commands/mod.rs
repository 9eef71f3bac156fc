mod serve;
mod shutdown;

pub use serve::ServeCommand;
pub use shutdown::ShutdownCommand;
