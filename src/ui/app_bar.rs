use crate::domain::identity::UserId;

pub const TITLE: &str = "Todo List App";

/// What the app bar's button does when clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Login,
    Logout,
}

impl SessionAction {
    pub fn for_user(current_user: Option<&UserId>) -> SessionAction {
        match current_user {
            Some(_) => SessionAction::Logout,
            None => SessionAction::Login,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionAction::Login => "Login (/login)",
            SessionAction::Logout => "Log out (/logout)",
        }
    }
}

pub fn render(current_user: Option<&UserId>) -> String {
    let action = SessionAction::for_user(current_user);
    match current_user {
        Some(user) => format!("== {TITLE} == [{user}] {}", action.label()),
        None => format!("== {TITLE} == {}", action.label()),
    }
}
