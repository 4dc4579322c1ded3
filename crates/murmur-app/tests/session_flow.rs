//! Integration tests for the auth session manager

mod common;

use assert_matches::assert_matches;
use common::{Fixture, PASSWORD};
use murmur_core::{AuthErrorCode, MurmurError, Presence, ProfilePatch, UserId, UserPatch};
use murmur_gateway::{AuthIdentity, AuthProvider, DocumentGateway, IdentityProvider};

/// Let the spawned auth-stream handler catch up.
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn initialize_resolves_with_no_session() {
    let fx = Fixture::new();

    fx.session.initialize().await.unwrap();

    assert!(fx.session.is_initialized());
    assert!(!fx.session.is_authenticated());
    // second call is a no-op
    fx.session.initialize().await.unwrap();
}

#[tokio::test]
async fn initialize_publishes_an_existing_session() {
    let fx = Fixture::new();
    fx.backend
        .sign_in("alice@example.com", PASSWORD)
        .await
        .unwrap();

    fx.session.initialize().await.unwrap();

    let user = fx.session.current_user().expect("merged identity");
    assert_eq!(user.id, fx.alice);
    assert_eq!(user.name, "Alice");
}

#[tokio::test]
async fn initialize_mirrors_later_auth_changes() {
    let fx = Fixture::new();
    fx.session.initialize().await.unwrap();

    fx.backend
        .sign_in("alice@example.com", PASSWORD)
        .await
        .unwrap();
    settle().await;
    assert!(fx.session.is_authenticated());

    fx.backend.sign_out().await.unwrap();
    settle().await;
    assert!(!fx.session.is_authenticated());
}

#[tokio::test]
async fn register_validates_fields_and_connectivity() {
    let fx = Fixture::new();

    let err = fx.session.register("", "secret", "Carol").await.unwrap_err();
    assert_matches!(err, MurmurError::Validation { .. });
    let err = fx
        .session
        .register("c@example.com", "", "Carol")
        .await
        .unwrap_err();
    assert_matches!(err, MurmurError::Validation { .. });
    let err = fx
        .session
        .register("c@example.com", "secret", "  ")
        .await
        .unwrap_err();
    assert_matches!(err, MurmurError::Validation { .. });

    fx.backend.set_online(false);
    let err = fx
        .session
        .register("c@example.com", "secret", "Carol")
        .await
        .unwrap_err();
    assert_matches!(err, MurmurError::Network { .. });
}

#[tokio::test]
async fn register_creates_the_profile_and_remembers_the_session() {
    let fx = Fixture::new();

    fx.session
        .register("carol@example.com", "secret", "Carol")
        .await
        .unwrap();

    let user = fx.session.current_user().expect("session user");
    assert_eq!(user.email, "carol@example.com");
    assert!(user.avatar.contains("seed=Carol"));
    assert_eq!(user.profile.joined, "January 1970");
    assert!(fx.session.has_session_hint());

    // the profile document exists under the provider uid
    let stored = fx.backend.get_user_profile(user.id).await.unwrap();
    assert_eq!(stored.name, "Carol");
}

#[tokio::test]
async fn register_surfaces_provider_codes_verbatim() {
    let fx = Fixture::new();

    let err = fx
        .session
        .register("alice@example.com", "long-enough", "Alice Again")
        .await
        .unwrap_err();
    assert_eq!(err.auth_code(), Some(AuthErrorCode::EmailInUse));

    let err = fx
        .session
        .register("new@example.com", "short", "Newcomer")
        .await
        .unwrap_err();
    assert_eq!(err.auth_code(), Some(AuthErrorCode::WeakPassword));
}

#[tokio::test]
async fn login_failure_records_the_error_and_keeps_no_session() {
    let fx = Fixture::new();

    let err = fx
        .session
        .login("alice@example.com", "wrong-password")
        .await
        .unwrap_err();
    assert_eq!(err.auth_code(), Some(AuthErrorCode::InvalidCredential));
    assert!(!fx.session.is_authenticated());
    assert!(fx.session.state().last_error.is_some());

    fx.session.login("alice@example.com", PASSWORD).await.unwrap();
    assert!(fx.session.is_authenticated());
    assert!(fx.session.state().last_error.is_none());
}

#[tokio::test]
async fn logout_clears_identity_and_hint_idempotently() {
    let fx = Fixture::new();
    fx.session.login("alice@example.com", PASSWORD).await.unwrap();
    assert!(fx.session.has_session_hint());

    fx.session.logout().await.unwrap();
    assert!(!fx.session.is_authenticated());
    assert!(!fx.session.has_session_hint());

    fx.session.logout().await.unwrap();
}

#[tokio::test]
async fn update_profile_requires_the_owning_session() {
    let fx = Fixture::new();

    let err = fx
        .session
        .update_profile(fx.alice, UserPatch::default())
        .await
        .unwrap_err();
    assert_matches!(err, MurmurError::Unauthorized { .. });

    fx.session.login("alice@example.com", PASSWORD).await.unwrap();
    let err = fx
        .session
        .update_profile(fx.bob, UserPatch::default())
        .await
        .unwrap_err();
    assert_matches!(err, MurmurError::Unauthorized { .. });
}

#[tokio::test]
async fn update_profile_merges_remote_and_local() {
    let fx = Fixture::new();
    fx.session.login("alice@example.com", PASSWORD).await.unwrap();

    fx.session
        .update_profile(
            fx.alice,
            UserPatch {
                presence: Some(Presence::Offline),
                profile: Some(ProfilePatch {
                    bio: Some("systems over vibes".into()),
                    ..ProfilePatch::default()
                }),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap();

    let local = fx.session.current_user().unwrap();
    assert_eq!(local.profile.bio, "systems over vibes");
    assert_eq!(local.presence, Presence::Offline);

    let remote = fx.backend.get_user_profile(fx.alice).await.unwrap();
    assert_eq!(remote.profile.bio, "systems over vibes");
    // fields outside the patch survive
    assert_eq!(remote.name, "Alice");
}

#[tokio::test]
async fn federated_first_login_creates_a_profile() {
    let fx = Fixture::new();
    let uid = UserId::new();
    fx.backend.preset_federated_identity(AuthIdentity {
        uid,
        email: "fed@example.com".to_string(),
        display_name: Some("Fed Erated".to_string()),
        avatar: Some("http://a/fed.svg".to_string()),
        provider: AuthProvider::Federated,
    });

    fx.session.login_federated().await.unwrap();

    let user = fx.session.current_user().expect("session user");
    assert_eq!(user.id, uid);
    assert_eq!(user.name, "Fed Erated");
    assert_eq!(user.avatar, "http://a/fed.svg");
    assert!(fx.backend.get_user_profile(uid).await.is_ok());

    // the second login finds the same profile instead of recreating it
    fx.session.logout().await.unwrap();
    fx.session.login_federated().await.unwrap();
    assert_eq!(fx.session.current_user().unwrap().id, uid);
}
