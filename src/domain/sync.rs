use crate::domain::Error;
use crate::domain::identity::UserId;
use crate::domain::store::driven_ports::DocumentStore;
use crate::domain::todo::{self, NewTodoItem, TodoItem};
use crate::external_connections::ExternalConnectivity;
use derive_more::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NoticeLevel {
    #[display("info")]
    Info,
    #[display("error")]
    Error,
}

/// A user-visible, non-fatal message shown alongside the list
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{level}: {message}")]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Notice {
        Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Notice {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl From<&Error> for Notice {
    fn from(value: &Error) -> Self {
        match value {
            Error::Invalid(_) => Notice::error("A to-do item needs some text."),
            Error::NotSignedIn => Notice::error("Sign in to manage your to-do items."),
            Error::RetrieveFailure { action, .. } => {
                Notice::error(format!("Could not {action}. Please try again."))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Unauthenticated,
    Authenticated,
}

/// Everything the view renders: who is signed in, their items, and the latest notice
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub current_user: Option<UserId>,
    pub items: Vec<TodoItem>,
    pub notice: Option<Notice>,
}

impl ViewState {
    pub fn phase(&self) -> SyncPhase {
        match self.current_user {
            Some(_) => SyncPhase::Authenticated,
            None => SyncPhase::Unauthenticated,
        }
    }
}

pub mod driven_ports {
    /// Source of creation timestamps
    pub trait Clock {
        /// Whole seconds since the Unix epoch
        fn now_seconds(&self) -> i64;
    }
}

pub struct SystemClock;

impl driven_ports::Clock for SystemClock {
    fn now_seconds(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or_default()
    }
}

pub mod driving_ports {
    use super::*;

    pub trait TodoListPort {
        /// Resets the view for [user] and, if someone is signed in, loads their items
        async fn current_user_changed(
            &self,
            user: Option<UserId>,
            ext_cxn: &impl ExternalConnectivity,
            store: &impl DocumentStore,
        ) -> Result<(), Error>;
        async fn submit(
            &self,
            text: &str,
            ext_cxn: &impl ExternalConnectivity,
            store: &impl DocumentStore,
            clock: &impl driven_ports::Clock,
        ) -> Result<(), Error>;
        async fn toggle(
            &self,
            item: &TodoItem,
            ext_cxn: &impl ExternalConnectivity,
            store: &impl DocumentStore,
        ) -> Result<(), Error>;
        async fn remove(
            &self,
            item: &TodoItem,
            ext_cxn: &impl ExternalConnectivity,
            store: &impl DocumentStore,
        ) -> Result<(), Error>;
        async fn refresh(
            &self,
            ext_cxn: &impl ExternalConnectivity,
            store: &impl DocumentStore,
        ) -> Result<(), Error>;

        /// Shows a notice that didn't come from the list itself (e.g. a failed sign-in)
        fn notify(&self, notice: Notice);
        fn view(&self) -> ViewState;
        fn view_changes(&self) -> watch::Receiver<ViewState>;
    }
}

/// Keeps the view in line with the store by re-reading the signed-in user's whole list after
/// every write. Reads are ticketed: only the most recently issued read may replace the list.
pub struct SyncController {
    view: watch::Sender<ViewState>,
    read_tickets: AtomicU64,
}

impl SyncController {
    pub fn new() -> SyncController {
        let (view, _) = watch::channel(ViewState::default());
        SyncController {
            view,
            read_tickets: AtomicU64::new(0),
        }
    }

    fn issue_ticket(&self) -> u64 {
        self.read_tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, ticket: u64) -> bool {
        self.read_tickets.load(Ordering::SeqCst) == ticket
    }

    fn clear_notice(&self) {
        self.view.send_if_modified(|view| view.notice.take().is_some());
    }

    /// Records [err] as the visible notice and hands it back
    fn report(&self, err: Error) -> Error {
        warn!("To-do list operation failed: {err}");
        let notice = Notice::from(&err);
        self.view.send_modify(|view| view.notice = Some(notice));
        err
    }

    fn signed_in_user(&self) -> Result<UserId, Error> {
        self.view
            .borrow()
            .current_user
            .clone()
            .ok_or(Error::NotSignedIn)
    }

    /// Issues the owner's list query and applies the result if no newer read was issued meanwhile.
    /// Nothing is read once [owner] is no longer signed in.
    async fn resync(
        &self,
        owner: &UserId,
        ext_cxn: &impl ExternalConnectivity,
        store: &impl DocumentStore,
    ) -> Result<(), Error> {
        let ticket = {
            let view = self.view.borrow();
            if view.current_user.as_ref() != Some(owner) {
                debug!("Skipped reading the list of a user who is no longer signed in");
                return Ok(());
            }
            self.issue_ticket()
        };
        let read_result = store
            .query(
                todo::COLLECTION,
                &todo::owned_by(owner),
                &todo::newest_first(),
                ext_cxn,
            )
            .await;

        let documents = match read_result {
            Ok(documents) => documents,
            Err(cause) => {
                let err = Error::trying_to("load your to-do items", cause);
                if self.is_latest(ticket) {
                    return Err(self.report(err));
                }
                debug!(ticket, "Superseded read failed: {err}");
                return Err(err);
            }
        };

        let items = todo::items_from_documents(documents);
        let item_count = items.len();
        let applied = self.view.send_if_modified(|view| {
            if !self.is_latest(ticket) || view.current_user.as_ref() != Some(owner) {
                return false;
            }
            view.items = items;
            true
        });

        if applied {
            debug!(ticket, item_count, "Replaced to-do list");
        } else {
            debug!(ticket, "Discarded a superseded read");
        }

        Ok(())
    }
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new()
    }
}

impl driving_ports::TodoListPort for SyncController {
    #[tracing::instrument(skip_all, fields(signed_in = user.is_some()))]
    async fn current_user_changed(
        &self,
        user: Option<UserId>,
        ext_cxn: &impl ExternalConnectivity,
        store: &impl DocumentStore,
    ) -> Result<(), Error> {
        self.view.send_modify(|view| {
            view.current_user = user.clone();
            view.items.clear();
            view.notice = None;
        });

        match user {
            Some(owner) => {
                info!("Loading to-do items for {owner}");
                self.resync(&owner, ext_cxn, store).await
            }
            None => {
                // Any read still in flight belongs to the previous user
                self.issue_ticket();
                Ok(())
            }
        }
    }

    #[tracing::instrument(skip_all)]
    async fn submit(
        &self,
        text: &str,
        ext_cxn: &impl ExternalConnectivity,
        store: &impl DocumentStore,
        clock: &impl driven_ports::Clock,
    ) -> Result<(), Error> {
        self.clear_notice();
        let owner = self.signed_in_user().map_err(|err| self.report(err))?;

        let new_item = NewTodoItem {
            content: text.to_owned(),
        };
        new_item
            .validate()
            .map_err(|err| self.report(Error::from(err)))?;

        let created_id = store
            .insert(
                todo::COLLECTION,
                new_item.into_fields(&owner, clock.now_seconds()),
                ext_cxn,
            )
            .await
            .map_err(|cause| self.report(Error::trying_to("add the to-do item", cause)))?;
        debug!(%created_id, "Created to-do item");

        self.resync(&owner, ext_cxn, store).await
    }

    #[tracing::instrument(skip_all, fields(id = %item.id))]
    async fn toggle(
        &self,
        item: &TodoItem,
        ext_cxn: &impl ExternalConnectivity,
        store: &impl DocumentStore,
    ) -> Result<(), Error> {
        self.clear_notice();
        let owner = self.signed_in_user().map_err(|err| self.report(err))?;

        store
            .partial_update(
                todo::COLLECTION,
                &item.id,
                todo::toggled_fields(item),
                ext_cxn,
            )
            .await
            .map_err(|cause| self.report(Error::trying_to("update the to-do item", cause)))?;

        self.resync(&owner, ext_cxn, store).await
    }

    #[tracing::instrument(skip_all, fields(id = %item.id))]
    async fn remove(
        &self,
        item: &TodoItem,
        ext_cxn: &impl ExternalConnectivity,
        store: &impl DocumentStore,
    ) -> Result<(), Error> {
        self.clear_notice();
        let owner = self.signed_in_user().map_err(|err| self.report(err))?;

        store
            .delete(todo::COLLECTION, &item.id, ext_cxn)
            .await
            .map_err(|cause| self.report(Error::trying_to("remove the to-do item", cause)))?;

        self.resync(&owner, ext_cxn, store).await
    }

    #[tracing::instrument(skip_all)]
    async fn refresh(
        &self,
        ext_cxn: &impl ExternalConnectivity,
        store: &impl DocumentStore,
    ) -> Result<(), Error> {
        self.clear_notice();
        let owner = self.signed_in_user().map_err(|err| self.report(err))?;

        self.resync(&owner, ext_cxn, store).await
    }

    fn notify(&self, notice: Notice) {
        self.view.send_modify(|view| view.notice = Some(notice));
    }

    fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }

    fn view_changes(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }
}
