use super::test_util;
use crate::domain::store::Fields;
use crate::domain::store::driven_ports::DocumentStore;
use crate::domain::sync::SyncController;
use crate::domain::sync::driving_ports::TodoListPort;
use crate::domain::sync::test_util::StepClock;
use crate::domain::todo;
use speculoos::prelude::*;

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn keeps_list_in_sync_with_firestore() {
    test_util::prepare_emulator_and_test(|project| async move {
        let controller = SyncController::new();
        let clock = StepClock::starting_at(1_700_000_000);
        controller
            .current_user_changed(Some(project.owner.clone()), &project.ext_cxn, &project.store)
            .await
            .expect("initial read");
        assert_that!(controller.view().items).is_empty();

        for text in ["a", "b"] {
            controller
                .submit(text, &project.ext_cxn, &project.store, &clock)
                .await
                .expect("submit");
        }
        let contents: Vec<String> = controller
            .view()
            .items
            .into_iter()
            .map(|item| item.content)
            .collect();
        assert_eq!(vec!["b", "a"], contents);

        let newest = controller.view().items[0].clone();
        controller
            .toggle(&newest, &project.ext_cxn, &project.store)
            .await
            .expect("toggle");
        assert!(controller.view().items[0].is_finished);

        controller
            .remove(&newest, &project.ext_cxn, &project.store)
            .await
            .expect("remove");
        let view = controller.view();
        assert_eq!(1, view.items.len());
        assert_eq!("a", view.items[0].content);
        assert_eq!(project.owner, view.items[0].owner_id);
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn updating_missing_document_fails() {
    test_util::prepare_emulator_and_test(|project| async move {
        let mut fields = Fields::new();
        fields.insert(todo::fields::IS_FINISHED.into(), true.into());

        let result = project
            .store
            .partial_update(todo::COLLECTION, "does-not-exist", fields, &project.ext_cxn)
            .await;

        assert_that!(result).is_err();
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn deleting_missing_document_succeeds() {
    test_util::prepare_emulator_and_test(|project| async move {
        let result = project
            .store
            .delete(todo::COLLECTION, "does-not-exist", &project.ext_cxn)
            .await;

        assert_that!(result).is_ok();
    });
}
