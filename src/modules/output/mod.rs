pub mod annotate;
mod videofile;

pub use videofile::VideoFileOutput;
