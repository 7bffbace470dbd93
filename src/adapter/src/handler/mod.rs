pub mod remote_read;
pub mod remote_write;

pub use remote_read::handle_remote_read;
pub use remote_write::handle_remote_write;
