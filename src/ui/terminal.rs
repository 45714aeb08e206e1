use crate::domain::identity::driven_ports::IdentityProvider;
use crate::domain::identity::{Credentials, SignInError, UserId};
use crate::domain::store::driven_ports::DocumentStore;
use crate::domain::sync::driven_ports::Clock;
use crate::domain::sync::driving_ports::TodoListPort;
use crate::domain::sync::{Notice, ViewState};
use crate::domain::todo::TodoItem;
use crate::external_connections::ExternalConnectivity;
use crate::ui::command::{self, Command};
use crate::ui::input_field::TodoInputField;
use crate::ui::item_list::{self, TodoItemList};
use crate::ui::app_bar;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// An operation started by the user or by a session change, still waiting on remote calls
type InFlight<'ctx> = LocalBoxFuture<'ctx, ()>;

#[derive(Clone, Copy)]
enum Click {
    Text,
    Remove,
}

/// Drives the to-do view from lines of terminal input.
///
/// Operations run concurrently so the prompt stays usable during round trips, and the screen is
/// redrawn whenever the controller publishes a new view.
pub struct TerminalSession<'ctx, X, S, I, K, P> {
    ext_cxn: &'ctx X,
    store: &'ctx S,
    identity: &'ctx I,
    clock: &'ctx K,
    todo_list: &'ctx P,
}

impl<X, S, I, K, P> Clone for TerminalSession<'_, X, S, I, K, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<X, S, I, K, P> Copy for TerminalSession<'_, X, S, I, K, P> {}

impl<'ctx, X, S, I, K, P> TerminalSession<'ctx, X, S, I, K, P>
where
    X: ExternalConnectivity + 'ctx,
    S: DocumentStore + 'ctx,
    I: IdentityProvider + 'ctx,
    K: Clock + 'ctx,
    P: TodoListPort + 'ctx,
{
    pub fn new(
        ext_cxn: &'ctx X,
        store: &'ctx S,
        identity: &'ctx I,
        clock: &'ctx K,
        todo_list: &'ctx P,
    ) -> Self {
        TerminalSession {
            ext_cxn,
            store,
            identity,
            clock,
            todo_list,
        }
    }

    /// Runs until `/quit` is entered or [input] closes. Operations already under way are allowed
    /// to finish before returning.
    pub async fn run(
        self,
        mut input: mpsc::Receiver<String>,
        output: &mut (impl AsyncWrite + Unpin),
    ) -> Result<(), anyhow::Error> {
        let mut session = self.identity.session_changes();
        let mut views = self.todo_list.view_changes();
        let mut input_field = TodoInputField::new();
        let mut in_flight: FuturesUnordered<InFlight<'ctx>> = FuturesUnordered::new();
        let mut session_open = true;

        if let Some(user) = session.current_user() {
            in_flight.push(self.user_changed(Some(user)));
        }
        let view = views.borrow_and_update().clone();
        render(&view, output).await?;

        loop {
            // Redraws and session changes go ahead of new input
            tokio::select! {
                biased;

                changed = views.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let view = views.borrow_and_update().clone();
                    render(&view, output).await?;
                }
                changed = session.changed(), if session_open => match changed {
                    Some(user) => in_flight.push(self.user_changed(user)),
                    None => {
                        warn!("Identity provider went away, no more session changes will arrive");
                        session_open = false;
                    }
                },
                Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
                line = input.recv() => {
                    let Some(line) = line else {
                        debug!("Input closed");
                        break;
                    };
                    match command::parse(&line) {
                        Ok(Command::Quit) => break,
                        Ok(Command::Help) => {
                            output.write_all(command::HELP.as_bytes()).await?;
                            output.flush().await?;
                        }
                        Ok(command) => {
                            if let Some(operation) = self.dispatch(command, &mut input_field) {
                                in_flight.push(operation);
                            }
                        }
                        Err(err) => self.todo_list.notify(Notice::error(err.to_string())),
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            info!(pending = in_flight.len(), "Waiting for pending operations before exiting");
        }
        while in_flight.next().await.is_some() {}

        Ok(())
    }

    fn dispatch(
        self,
        command: Command,
        input_field: &mut TodoInputField,
    ) -> Option<InFlight<'ctx>> {
        match command {
            Command::Submit(text) => {
                input_field.on_change(text);
                Some(input_field.submit(|text| self.submit(text)))
            }
            Command::Login(credentials) => Some(self.sign_in(credentials)),
            Command::Logout => Some(self.sign_out()),
            Command::Toggle(key) => self.click(key, Click::Text),
            Command::Remove(key) => self.click(key, Click::Remove),
            Command::Refresh => Some(self.refresh()),
            Command::Help | Command::Quit => None,
        }
    }

    /// Clicks row [key] of the list as currently shown
    fn click(self, key: usize, click: Click) -> Option<InFlight<'ctx>> {
        let view = self.todo_list.view();
        let mut list = TodoItemList::new(
            &view.items,
            |item: &TodoItem| self.toggle(item.clone()),
            |item: &TodoItem| self.remove(item.clone()),
        );

        let operation = match click {
            Click::Text => list.click_text(key),
            Click::Remove => list.click_remove(key),
        };
        if operation.is_none() {
            self.todo_list
                .notify(Notice::info(format!("There is no item {key}.")));
        }
        operation
    }

    // Failed list operations are already shown to the user as a notice, so their errors are
    // dropped here

    fn user_changed(self, user: Option<UserId>) -> InFlight<'ctx> {
        async move {
            let _ = self
                .todo_list
                .current_user_changed(user, self.ext_cxn, self.store)
                .await;
        }
        .boxed_local()
    }

    fn submit(self, text: String) -> InFlight<'ctx> {
        async move {
            let _ = self
                .todo_list
                .submit(&text, self.ext_cxn, self.store, self.clock)
                .await;
        }
        .boxed_local()
    }

    fn toggle(self, item: TodoItem) -> InFlight<'ctx> {
        async move {
            let _ = self.todo_list.toggle(&item, self.ext_cxn, self.store).await;
        }
        .boxed_local()
    }

    fn remove(self, item: TodoItem) -> InFlight<'ctx> {
        async move {
            let _ = self.todo_list.remove(&item, self.ext_cxn, self.store).await;
        }
        .boxed_local()
    }

    fn refresh(self) -> InFlight<'ctx> {
        async move {
            let _ = self.todo_list.refresh(self.ext_cxn, self.store).await;
        }
        .boxed_local()
    }

    /// The list follows along through the session listener, so only failures are handled here
    fn sign_in(self, credentials: Credentials) -> InFlight<'ctx> {
        async move {
            if let Err(err) = self.identity.sign_in(&credentials, self.ext_cxn).await {
                if let SignInError::PortError(cause) = &err {
                    warn!("Sign-in failed: {cause:#}");
                }
                self.todo_list.notify(sign_in_notice(&err));
            }
        }
        .boxed_local()
    }

    fn sign_out(self) -> InFlight<'ctx> {
        async move {
            if let Err(err) = self.identity.sign_out(self.ext_cxn).await {
                warn!("Sign-out failed: {err:#}");
                self.todo_list
                    .notify(Notice::error("Could not sign out. Please try again."));
            }
        }
        .boxed_local()
    }
}

fn sign_in_notice(err: &SignInError) -> Notice {
    match err {
        SignInError::Cancelled => Notice::info("Sign-in cancelled."),
        SignInError::Rejected(reason) => Notice::error(format!("Sign-in failed: {reason}")),
        SignInError::PortError(_) => {
            Notice::error("Could not reach the sign-in service. Please try again.")
        }
    }
}

/// The whole screen for [view]: app bar, latest notice, the list, and a prompt
pub fn render_view(view: &ViewState) -> String {
    let mut screen = String::from("\n");
    screen.push_str(&app_bar::render(view.current_user.as_ref()));
    screen.push('\n');
    if let Some(notice) = &view.notice {
        screen.push_str(&format!("{notice}\n"));
    }
    match view.current_user {
        Some(_) => screen.push_str(&item_list::render_items(&view.items)),
        None => screen.push_str("  Sign in to see your to-do items.\n"),
    }
    screen.push_str("> ");
    screen
}

async fn render(view: &ViewState, output: &mut (impl AsyncWrite + Unpin)) -> Result<(), anyhow::Error> {
    output.write_all(render_view(view).as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
