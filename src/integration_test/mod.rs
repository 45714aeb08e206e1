mod firestore_api;
mod test_util;
