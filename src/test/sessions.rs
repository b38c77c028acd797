#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::auth::{AccountUpdate, IdentityProvider, LocalIdentity};
    use crate::db::{
        clean_expired_sessions, create_password_reset, create_session, find_account_by_email,
        get_account, get_session_by_token,
    };
    use crate::error::AppError;
    use crate::test::test_utils::{STANDARD_PASSWORD, TestDbBuilder};

    async fn identity_with_user() -> (LocalIdentity, i64, sqlx::Pool<sqlx::Sqlite>) {
        let test_db = TestDbBuilder::new()
            .admin("admin@iglesia.test", "Ana")
            .build()
            .await
            .unwrap();
        let pool = test_db.pool.clone();
        let account = find_account_by_email(&pool, "admin@iglesia.test")
            .await
            .unwrap()
            .unwrap();

        (LocalIdentity::new(pool.clone(), Duration::hours(1)), account.id, pool)
    }

    #[rocket::async_test]
    async fn test_sign_in_issues_valid_session() {
        let (identity, account_id, _) = identity_with_user().await;

        let session = identity
            .sign_in("ADMIN@iglesia.test ", STANDARD_PASSWORD)
            .await
            .unwrap()
            .expect("valid credentials should sign in");

        assert_eq!(session.account_id, account_id);
        assert_eq!(session.token.len(), 48);
        assert!(session.is_valid());

        let loaded = identity.get_session(&session.token).await.unwrap();
        assert_eq!(loaded.token, session.token);
        assert_eq!(loaded.account_id, account_id);

        assert!(
            identity
                .sign_in("admin@iglesia.test", "wrong")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[rocket::async_test]
    async fn test_sign_out_invalidates_session() {
        let (identity, _, _) = identity_with_user().await;
        let session = identity
            .sign_in("admin@iglesia.test", STANDARD_PASSWORD)
            .await
            .unwrap()
            .unwrap();

        identity.sign_out(&session.token).await.unwrap();

        assert!(matches!(
            identity.get_session(&session.token).await,
            Err(AppError::Authentication(_))
        ));
    }

    #[rocket::async_test]
    async fn test_expired_sessions_are_rejected_and_cleaned() {
        let (identity, account_id, pool) = identity_with_user().await;

        let expired_at = (Utc::now() - Duration::hours(2)).naive_utc();
        create_session(&pool, account_id, "expired-token", expired_at)
            .await
            .unwrap();

        assert!(matches!(
            identity.get_session("expired-token").await,
            Err(AppError::Authentication(_))
        ));

        let cleaned = clean_expired_sessions(&pool).await.unwrap();
        assert_eq!(cleaned, 1);
        assert!(get_session_by_token(&pool, "expired-token").await.is_err());
    }

    #[rocket::async_test]
    async fn test_password_reset_flow() {
        let (identity, account_id, pool) = identity_with_user().await;

        identity
            .send_password_reset("nadie@iglesia.test")
            .await
            .unwrap();

        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();
        create_password_reset(&pool, account_id, "reset-token", expires_at)
            .await
            .unwrap();
        let session = identity
            .sign_in("admin@iglesia.test", STANDARD_PASSWORD)
            .await
            .unwrap()
            .unwrap();

        identity
            .complete_password_reset("reset-token", "nueva-clave")
            .await
            .unwrap();

        assert!(identity.get_session(&session.token).await.is_err());
        assert!(
            identity
                .sign_in("admin@iglesia.test", "nueva-clave")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            identity
                .complete_password_reset("reset-token", "otra-clave")
                .await
                .is_err()
        );
    }

    #[rocket::async_test]
    async fn test_account_updates_and_deletion() {
        let (identity, account_id, pool) = identity_with_user().await;

        identity
            .update_user_by_id(
                account_id,
                &AccountUpdate {
                    email: Some("ana@iglesia.test".to_string()),
                    password: Some("segura123".to_string()),
                },
            )
            .await
            .unwrap();

        assert!(
            identity
                .sign_in("ana@iglesia.test", "segura123")
                .await
                .unwrap()
                .is_some()
        );

        let created = identity
            .create_user("nuevo@iglesia.test", STANDARD_PASSWORD)
            .await
            .unwrap();
        assert!(matches!(
            identity.create_user("NUEVO@iglesia.test", "x").await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(
            get_account(&pool, created.id).await.unwrap().email,
            "nuevo@iglesia.test"
        );

        identity.delete_user(created.id).await.unwrap();
        assert!(matches!(
            get_account(&pool, created.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
