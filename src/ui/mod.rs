mod main_window;
mod preview;
mod seek_bar;

pub use main_window::*;
pub use preview::*;
pub use seek_bar::*;
