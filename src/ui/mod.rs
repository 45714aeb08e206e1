//! Terminal rendition of the to-do view: the app bar, the text input, the item list, and the
//! session loop driving them

pub mod app_bar;
pub mod command;
pub mod input_field;
pub mod item_list;
pub mod terminal;
