mod sink;

pub use sink::*;
