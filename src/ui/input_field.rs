/// Holds the text of a to-do item being typed, until it is submitted
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TodoInputField {
    text: String,
}

impl TodoInputField {
    pub fn new() -> TodoInputField {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text verbatim. Validation happens when the item is created, not here.
    pub fn on_change(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Hands the current text to [on_submit] and leaves the field empty
    pub fn submit<R>(&mut self, on_submit: impl FnOnce(String) -> R) -> R {
        let text = std::mem::take(&mut self.text);
        on_submit(text)
    }
}
