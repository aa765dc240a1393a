mod columns;
mod matcher;

pub use columns::*;
pub use matcher::*;
