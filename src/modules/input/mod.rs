mod memory;
mod videofile;

pub use memory::MemoryInput;
pub use videofile::VideoFileInput;
