#[cfg(test)]
mod tests {
    use crate::api::UserData;
    use crate::auth::Role;
    use crate::db::{create_account, find_account_by_email, find_profile_by_user_id};
    use crate::test::test_utils::{
        STANDARD_PASSWORD, TestDbBuilder, create_standard_test_db, login_test_user,
        setup_test_client,
    };
    use crate::validation::ValidationResponse;
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[rocket::async_test]
    async fn test_admin_cannot_delete_self() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_user(&client, "admin@iglesia.test", STANDARD_PASSWORD).await;

        let admin_id = test_db.profile_id("admin@iglesia.test").unwrap();
        let response = client
            .delete(format!("/api/users/{}", admin_id))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert_eq!(body.errors["user"], vec!["No puedes eliminarte a ti mismo".to_string()]);
    }

    #[rocket::async_test]
    async fn test_delete_user_with_songs_is_rejected() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_user(&client, "admin@iglesia.test", STANDARD_PASSWORD).await;

        let editor_id = test_db.profile_id("editor@iglesia.test").unwrap();
        let response = client
            .delete(format!("/api/users/{}", editor_id))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Conflict);
        assert!(test_db.profile("editor@iglesia.test").await.is_ok());
    }

    #[rocket::async_test]
    async fn test_delete_user_leading_setlists_is_rejected() {
        let test_db = TestDbBuilder::new()
            .admin("admin@iglesia.test", "Ana")
            .editor("editor@iglesia.test", "Esteban")
            .song_with(
                "Cuan Grande Es Él",
                "Tradicional",
                crate::catalog::MusicalKey::G,
                None,
                Some("admin@iglesia.test"),
            )
            .setlist(
                "Culto de Oración",
                crate::test::test_utils::upcoming_date(3),
                Some("editor@iglesia.test"),
                &["Cuan Grande Es Él"],
            )
            .build()
            .await
            .unwrap();
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_user(&client, "admin@iglesia.test", STANDARD_PASSWORD).await;

        let editor_id = test_db.profile_id("editor@iglesia.test").unwrap();
        let response = client
            .delete(format!("/api/users/{}", editor_id))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Conflict);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert_eq!(
            body.errors["user"],
            vec!["No puedes eliminar este usuario porque tiene listas asignadas".to_string()]
        );
    }

    #[rocket::async_test]
    async fn test_create_update_and_delete_user() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_user(&client, "admin@iglesia.test", STANDARD_PASSWORD).await;

        let response = client
            .post("/api/users")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": "Nuevo@Iglesia.test",
                    "password": "secreto1",
                    "first_name": "Nicolás",
                    "last_name": "Ruiz",
                    "role": "Editor y Creador",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let created: UserData = response.into_json().await.unwrap();
        assert_eq!(created.email, "nuevo@iglesia.test");
        assert_eq!(created.full_name, "Nicolás Ruiz");
        assert!(created.capabilities.can_create_songs);

        let response = client
            .put(format!("/api/users/{}", created.id))
            .header(ContentType::JSON)
            .body(
                json!({
                    "first_name": "Nicolás",
                    "last_name": "Ruiz",
                    "email": "nicolas@iglesia.test",
                    "role": "Lector",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let updated: UserData = response.into_json().await.unwrap();
        assert_eq!(updated.role, "Lector");
        assert_eq!(updated.email, "nicolas@iglesia.test");

        let account = find_account_by_email(&test_db.pool, "nicolas@iglesia.test")
            .await
            .unwrap();
        assert_eq!(account.map(|a| a.id), Some(created.user_id));

        let response = client
            .delete(format!("/api/users/{}", created.id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let account = find_account_by_email(&test_db.pool, "nicolas@iglesia.test")
            .await
            .unwrap();
        assert!(account.is_none());

        let response = client.get("/api/users").dispatch().await;
        let users: Vec<UserData> = response.into_json().await.unwrap();
        assert_eq!(users.len(), 3);
    }

    #[rocket::async_test]
    async fn test_create_user_rejections() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;
        login_test_user(&client, "admin@iglesia.test", STANDARD_PASSWORD).await;

        let response = client
            .post("/api/users")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": "lector@iglesia.test",
                    "password": "secreto1",
                    "first_name": "Lucia",
                    "last_name": "Otra",
                    "role": "Lector",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);

        // Lider belongs to the other scheme.
        let response = client
            .post("/api/users")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": "lider@iglesia.test",
                    "password": "secreto1",
                    "first_name": "Luis",
                    "last_name": "Mora",
                    "role": "Lider",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert!(body.errors.contains_key("role"));

        let response = client
            .post("/api/users")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": "corto@iglesia.test",
                    "password": "123",
                    "first_name": "Carla",
                    "last_name": "Soto",
                    "role": "Lector",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert!(body.errors.contains_key("password"));
    }

    #[rocket::async_test]
    async fn test_create_user_reuses_existing_account() {
        let test_db = create_standard_test_db().await;
        let account_id = create_account(&test_db.pool, "huerfano@iglesia.test", "original1")
            .await
            .unwrap();
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_user(&client, "admin@iglesia.test", STANDARD_PASSWORD).await;

        let response = client
            .post("/api/users")
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": "huerfano@iglesia.test",
                    "password": "ignorada1",
                    "first_name": "Hugo",
                    "last_name": "Paz",
                    "role": "Lector",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let created: UserData = response.into_json().await.unwrap();
        assert_eq!(created.user_id, account_id);

        let profile = find_profile_by_user_id(&test_db.pool, test_db.scheme, account_id)
            .await
            .unwrap();
        assert!(profile.is_some());

        client.post("/api/logout").dispatch().await;
        let login = login_test_user(&client, "huerfano@iglesia.test", "original1").await;
        assert!(login.success);
    }

    #[rocket::async_test]
    async fn test_first_login_provisions_profile() {
        let test_db = TestDbBuilder::new()
            .admin("admin@iglesia.test", "Ana")
            .build()
            .await
            .unwrap();
        let account_id = create_account(&test_db.pool, "nuevo@iglesia.test", STANDARD_PASSWORD)
            .await
            .unwrap();
        let (client, test_db) = setup_test_client(test_db).await;

        let login = login_test_user(&client, "nuevo@iglesia.test", STANDARD_PASSWORD).await;

        assert!(login.success);
        let user = login.user.unwrap();
        assert_eq!(user.user_id, account_id);
        assert_eq!(user.role, Role::Reader.as_str());
        assert!(!user.capabilities.can_manage_setlists);

        let profile = find_profile_by_user_id(&test_db.pool, test_db.scheme, account_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.email, "nuevo@iglesia.test");
    }

    #[rocket::async_test]
    async fn test_non_admin_cannot_manage_users() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_user(&client, "editor@iglesia.test", STANDARD_PASSWORD).await;

        let response = client.get("/api/users").dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);

        let reader_id = test_db.profile_id("lector@iglesia.test").unwrap();
        let response = client
            .delete(format!("/api/users/{}", reader_id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn test_failed_account_delete_keeps_profile() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_user(&client, "admin@iglesia.test", STANDARD_PASSWORD).await;

        sqlx::query(
            "CREATE TRIGGER lock_accounts BEFORE DELETE ON accounts
             BEGIN SELECT RAISE(ABORT, 'accounts are locked'); END",
        )
        .execute(&test_db.pool)
        .await
        .unwrap();

        let reader_id = test_db.profile_id("lector@iglesia.test").unwrap();
        let response = client
            .delete(format!("/api/users/{}", reader_id))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::InternalServerError);
        assert!(test_db.profile("lector@iglesia.test").await.is_ok());
    }

    #[rocket::async_test]
    async fn test_failed_profile_update_leaves_account_untouched() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_user(&client, "admin@iglesia.test", STANDARD_PASSWORD).await;

        sqlx::query(
            "CREATE TRIGGER lock_profiles BEFORE UPDATE ON profiles
             BEGIN SELECT RAISE(ABORT, 'profiles are locked'); END",
        )
        .execute(&test_db.pool)
        .await
        .unwrap();

        let reader_id = test_db.profile_id("lector@iglesia.test").unwrap();
        let response = client
            .put(format!("/api/users/{}", reader_id))
            .header(ContentType::JSON)
            .body(
                json!({
                    "first_name": "Lucia",
                    "last_name": "Prueba",
                    "email": "lucia@iglesia.test",
                    "role": "Lector",
                    "password": "nueva123",
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::InternalServerError);
        assert!(
            find_account_by_email(&test_db.pool, "lucia@iglesia.test")
                .await
                .unwrap()
                .is_none()
        );

        client.post("/api/logout").dispatch().await;
        let login = login_test_user(&client, "lector@iglesia.test", STANDARD_PASSWORD).await;
        assert!(login.success);
    }

    #[rocket::async_test]
    async fn test_rejected_account_update_restores_profile() {
        let test_db = create_standard_test_db().await;
        create_account(&test_db.pool, "ocupado@iglesia.test", STANDARD_PASSWORD)
            .await
            .unwrap();
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_user(&client, "admin@iglesia.test", STANDARD_PASSWORD).await;

        let reader_id = test_db.profile_id("lector@iglesia.test").unwrap();
        let response = client
            .put(format!("/api/users/{}", reader_id))
            .header(ContentType::JSON)
            .body(
                json!({
                    "first_name": "Lucía",
                    "last_name": "Gómez",
                    "email": "ocupado@iglesia.test",
                    "role": "Editor y Creador",
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Conflict);

        let profile = test_db.profile("lector@iglesia.test").await.unwrap();
        assert_eq!(profile.email, "lector@iglesia.test");
        assert_eq!(profile.first_name, "Lucia");
        assert_eq!(profile.role, Role::Reader);
    }
}
