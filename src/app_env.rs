/// Which backend adapters to use: "firebase" (default) or "memory"
pub const BACKEND: &str = "TODO_BACKEND";
/// Log level configuration for the application. For formatting info, see [tracing_subscriber's EnvFilter documentation](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
pub const LOG_LEVEL: &str = "LOG_LEVEL";

/// Web API key of the Firebase project holding the to-do items
pub const FIREBASE_API_KEY: &str = "FIREBASE_API_KEY";
/// ID of the Firebase project holding the to-do items
pub const FIREBASE_PROJECT_ID: &str = "FIREBASE_PROJECT_ID";
/// Overrides the Firestore REST root (e.g. http://localhost:8080/v1 for the emulator)
pub const FIRESTORE_BASE_URL: &str = "FIRESTORE_BASE_URL";
/// Overrides the Identity Toolkit REST root (e.g. http://localhost:9099/identitytoolkit.googleapis.com/v1 for the emulator)
pub const IDENTITY_TOOLKIT_BASE_URL: &str = "IDENTITY_TOOLKIT_BASE_URL";
/// Overrides the Secure Token REST root used to refresh expired ID tokens
pub const SECURE_TOKEN_BASE_URL: &str = "SECURE_TOKEN_BASE_URL";

/// OpenTelemetry span export URL. Should be http://localhost:4317 by default, as the client
/// expects an OpenTelemetry collector running alongside it which directs traces to the correct place
pub const OTEL_SPAN_EXPORT_URL: &str = "OTEL_SPAN_EXPORT_URL";
/// OpenTelemetry metrics export URL. Should be http://localhost:4317 by default, as the client
/// expects an OpenTelemetry collector running alongside it which directs metrics to the correct place
pub const OTEL_METRIC_EXPORT_URL: &str = "OTEL_METRIC_EXPORT_URL";

#[cfg(test)]
pub mod test {
    /// Host and port of a running Firestore emulator, used by integration tests
    pub const FIRESTORE_EMULATOR_HOST: &str = "FIRESTORE_EMULATOR_HOST";
}
