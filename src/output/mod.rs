// Output generation module

pub mod html;
pub mod links;
pub mod templates;

pub use html::*;
pub use links::*;
pub use templates::*;
