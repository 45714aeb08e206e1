use crate::domain::todo::TodoItem;
use std::fmt::Write;

const STRIKETHROUGH: &str = "\x1b[9m";
const RESET: &str = "\x1b[0m";

/// Renders an ordered list of to-do items and forwards clicks on them.
///
/// Rows are keyed by their 1-based position in the list, which is fine because the list is only
/// ever replaced wholesale.
pub struct TodoItemList<'items, Toggle, Remove> {
    items: &'items [TodoItem],
    on_toggle: Toggle,
    on_remove: Remove,
}

impl<'items, Toggle, Remove, Out> TodoItemList<'items, Toggle, Remove>
where
    Toggle: FnMut(&'items TodoItem) -> Out,
    Remove: FnMut(&'items TodoItem) -> Out,
{
    pub fn new(items: &'items [TodoItem], on_toggle: Toggle, on_remove: Remove) -> Self {
        TodoItemList {
            items,
            on_toggle,
            on_remove,
        }
    }

    fn row(&self, key: usize) -> Option<&'items TodoItem> {
        key.checked_sub(1).and_then(|index| self.items.get(index))
    }

    /// Clicking an item's text asks for its finished flag to be flipped
    pub fn click_text(&mut self, key: usize) -> Option<Out> {
        let item = self.row(key)?;
        Some((self.on_toggle)(item))
    }

    pub fn click_remove(&mut self, key: usize) -> Option<Out> {
        let item = self.row(key)?;
        Some((self.on_remove)(item))
    }

    pub fn render(&self) -> String {
        render_items(self.items)
    }
}

/// One line per item. Finished items are struck through.
pub fn render_items(items: &[TodoItem]) -> String {
    if items.is_empty() {
        return "  (nothing to do)\n".to_owned();
    }

    let mut rendered = String::new();
    for (index, item) in items.iter().enumerate() {
        // Writing to a String can't fail
        let _ = writeln!(rendered, "{}", render_row(index + 1, item));
    }
    rendered
}

fn render_row(key: usize, item: &TodoItem) -> String {
    if item.is_finished {
        format!("{key:>3}. [x] {STRIKETHROUGH}{}{RESET}", item.content)
    } else {
        format!("{key:>3}. [ ] {}", item.content)
    }
}
