mod otsu;

pub use otsu::OtsuThreshold;
