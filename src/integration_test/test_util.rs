use crate::app_env;
use crate::config::FirebaseConfig;
use crate::domain::identity::UserId;
use crate::external_connections::HttpConnectivity;
use crate::persistence::firebase_auth::FirebaseIdentity;
use crate::persistence::firestore::FirestoreStore;
use dotenv::dotenv;
use lazy_static::lazy_static;
use rand::{Rng, thread_rng};
use std::env;
use std::future::Future;
use tokio::runtime::Runtime;

lazy_static! {
    static ref TOKIO_RT: Runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Tokio runtime failed to initialize");
}

/// A throwaway Firestore project on the emulator, plus an owner nobody else uses
pub struct EmulatorProject {
    pub store: FirestoreStore,
    pub ext_cxn: HttpConnectivity,
    pub owner: UserId,
}

/// Runs [test_fn] against a freshly named project on a running Firestore emulator. Each run gets
/// its own project ID, so leftover documents from earlier runs never show up.
///
/// Expects that the FIRESTORE_EMULATOR_HOST environment variable is populated
pub fn prepare_emulator_and_test<F, R>(test_fn: F)
where
    R: Future<Output = ()>,
    F: FnOnce(EmulatorProject) -> R,
{
    if dotenv().is_err() {
        println!("Test is running without .env file.");
    }

    TOKIO_RT.block_on(async move {
        let emulator_host = env::var(app_env::test::FIRESTORE_EMULATOR_HOST).expect(
            "You must provide the FIRESTORE_EMULATOR_HOST environment variable, e.g. localhost:8080",
        );
        let (project_suffix, owner_suffix) = {
            let mut rng = thread_rng();
            (
                rng.gen_range(10_000..99_999u32),
                rng.gen_range(10_000..99_999u32),
            )
        };

        let config = FirebaseConfig {
            api_key: "fake-api-key".to_owned(),
            project_id: format!("demo-todo-{project_suffix}"),
            firestore_base_url: format!("http://{emulator_host}/v1"),
            identity_toolkit_base_url: format!("http://{emulator_host}/identitytoolkit.googleapis.com/v1"),
            secure_token_base_url: format!("http://{emulator_host}/securetoken.googleapis.com/v1"),
        };
        let identity = FirebaseIdentity::new(&config);
        let project = EmulatorProject {
            store: FirestoreStore::new(&config, identity.token_source()),
            ext_cxn: HttpConnectivity::new().expect("HTTP client failed to initialize"),
            owner: UserId::new(format!("owner-{owner_suffix}")).expect("owner id is not blank"),
        };

        test_fn(project).await;
    });
}
