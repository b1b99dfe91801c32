// Kept in its own test binary: it mutates process environment.

use searchlink::{Client, ClientError, ErrorKind};

#[test]
fn missing_api_key_fails_at_build_time() {
    // SAFETY: this binary runs a single test, so no other thread reads the environment.
    unsafe { std::env::remove_var(searchlink::config::API_KEY_ENV) };

    let err = Client::builder()
        .base_url("http://127.0.0.1:9")
        .build()
        .unwrap_err();

    assert!(matches!(err, ClientError::Api(_)));
    assert_eq!(err.kind(), ErrorKind::AuthenticationError);
}
