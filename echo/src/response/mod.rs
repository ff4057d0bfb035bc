pub mod renderer;
pub mod selector;

pub use renderer::{Context, ResponseRenderer};
pub use selector::{ResponseSelector, SelectorFn};
