#[cfg(test)]
pub mod test_db {
    use crate::auth::{Role, RoleScheme, User};
    use crate::catalog::{MusicalKey, ServiceType};
    use crate::db::{
        NewProfile, create_account, create_profile, create_setlist_with_songs, create_song,
        create_song_type, get_profile, get_song_summaries,
    };
    use crate::error::AppError;
    use crate::models::{SetlistFields, SongFields};
    use crate::setlist::SetlistComposer;
    use chrono::{Duration, NaiveDate, Utc};
    use sqlx::{Pool, Sqlite, SqlitePool};
    use std::collections::HashMap;
    use std::sync::Once;
    use tracing::log::LevelFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub struct TestDbBuilder {
        scheme: RoleScheme,
        users: Vec<TestUser>,
        song_types: Vec<String>,
        songs: Vec<TestSong>,
        setlists: Vec<TestSetlist>,
    }

    pub struct TestUser {
        pub email: String,
        pub first_name: String,
        pub role: Role,
        pub password: String,
    }

    pub struct TestSong {
        pub name: String,
        pub artist: String,
        pub key: MusicalKey,
        pub song_type: Option<String>,
        pub creator_email: Option<String>,
    }

    pub struct TestSetlist {
        pub name: String,
        pub date: NaiveDate,
        pub leader_email: Option<String>,
        pub songs: Vec<String>,
    }

    impl Default for TestDbBuilder {
        fn default() -> Self {
            Self {
                scheme: RoleScheme::EditorReader,
                users: Vec::new(),
                song_types: Vec::new(),
                songs: Vec::new(),
                setlists: Vec::new(),
            }
        }
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn scheme(mut self, scheme: RoleScheme) -> Self {
            self.scheme = scheme;
            self
        }

        pub fn user_with_password(
            mut self,
            email: &str,
            first_name: &str,
            role: Role,
            password: &str,
        ) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                first_name: first_name.to_string(),
                role,
                password: password.to_string(),
            });
            self
        }

        pub fn user(self, email: &str, first_name: &str, role: Role) -> Self {
            self.user_with_password(email, first_name, role, STANDARD_PASSWORD)
        }

        pub fn admin(self, email: &str, first_name: &str) -> Self {
            self.user(email, first_name, Role::Admin)
        }

        pub fn editor(self, email: &str, first_name: &str) -> Self {
            self.user(email, first_name, Role::EditorCreator)
        }

        pub fn reader(self, email: &str, first_name: &str) -> Self {
            self.user(email, first_name, Role::Reader)
        }

        pub fn leader(self, email: &str, first_name: &str) -> Self {
            self.user(email, first_name, Role::Leader)
        }

        pub fn song_type(mut self, name: &str) -> Self {
            self.song_types.push(name.to_string());
            self
        }

        pub fn song(self, name: &str, artist: &str, key: MusicalKey) -> Self {
            self.song_with(name, artist, key, None, None)
        }

        pub fn song_with(
            mut self,
            name: &str,
            artist: &str,
            key: MusicalKey,
            song_type: Option<&str>,
            creator_email: Option<&str>,
        ) -> Self {
            self.songs.push(TestSong {
                name: name.to_string(),
                artist: artist.to_string(),
                key,
                song_type: song_type.map(String::from),
                creator_email: creator_email.map(String::from),
            });
            self
        }

        pub fn setlist(
            mut self,
            name: &str,
            date: NaiveDate,
            leader_email: Option<&str>,
            songs: &[&str],
        ) -> Self {
            self.setlists.push(TestSetlist {
                name: name.to_string(),
                date,
                leader_email: leader_email.map(String::from),
                songs: songs.iter().map(|s| s.to_string()).collect(),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .filter_level(LevelFilter::Debug)
                    .is_test(true)
                    .try_init();
            });

            let pool = SqlitePool::connect("sqlite::memory:").await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut profile_id_map: HashMap<String, i64> = HashMap::new();
            let mut song_type_id_map: HashMap<String, i64> = HashMap::new();
            let mut song_id_map: HashMap<String, i64> = HashMap::new();
            let mut setlist_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let account_id = create_account(&pool, &user.email, &user.password).await?;
                let profile_id = create_profile(
                    &pool,
                    &NewProfile {
                        user_id: account_id,
                        first_name: user.first_name.clone(),
                        last_name: "Prueba".to_string(),
                        email: user.email.clone(),
                        role: user.role,
                    },
                )
                .await?;

                profile_id_map.insert(user.email.clone(), profile_id);
            }

            for name in &self.song_types {
                let id = create_song_type(&pool, name, None).await?;
                song_type_id_map.insert(name.clone(), id);
            }

            let first_profile = self
                .users
                .first()
                .map(|u| profile_id_map[&u.email]);

            for song in &self.songs {
                let creator = match &song.creator_email {
                    Some(email) => profile_id_map.get(email).copied(),
                    None => first_profile,
                };

                let Some(creator) = creator else {
                    return Err(AppError::Internal(
                        "Test songs need at least one user".to_string(),
                    ));
                };

                let fields = SongFields {
                    name: song.name.clone(),
                    artist: song.artist.clone(),
                    key: song.key,
                    lyrics: format!("Letra de {}", song.name),
                    youtube_link: None,
                    multitrack_link: None,
                    chord_chart_link: None,
                    song_type_id: song
                        .song_type
                        .as_ref()
                        .and_then(|name| song_type_id_map.get(name).copied()),
                };

                let id = create_song(&pool, &fields, creator).await?;
                song_id_map.insert(song.name.clone(), id);
            }

            for setlist in &self.setlists {
                let leader = match &setlist.leader_email {
                    Some(email) => profile_id_map.get(email).copied(),
                    None => first_profile,
                };

                let Some(leader) = leader else {
                    return Err(AppError::Internal(
                        "Test setlists need at least one user".to_string(),
                    ));
                };

                let selection: Vec<i64> = setlist
                    .songs
                    .iter()
                    .filter_map(|name| song_id_map.get(name).copied())
                    .collect();
                let composer = SetlistComposer::with_selection(
                    get_song_summaries(&pool).await?,
                    selection,
                    Vec::<i64>::new(),
                );

                let fields = SetlistFields {
                    name: setlist.name.clone(),
                    date: setlist.date,
                    service_type: ServiceType::SundayMorning,
                    notes: None,
                };

                let id = create_setlist_with_songs(&pool, leader, &fields, &composer).await?;
                setlist_id_map.insert(setlist.name.clone(), id);
            }

            Ok(TestDb {
                pool,
                scheme: self.scheme,
                profile_id_map,
                song_type_id_map,
                song_id_map,
                setlist_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub scheme: RoleScheme,
        pub profile_id_map: HashMap<String, i64>,
        pub song_type_id_map: HashMap<String, i64>,
        pub song_id_map: HashMap<String, i64>,
        pub setlist_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn profile_id(&self, email: &str) -> Option<i64> {
            self.profile_id_map.get(email).copied()
        }

        pub fn song_type_id(&self, name: &str) -> Option<i64> {
            self.song_type_id_map.get(name).copied()
        }

        pub fn song_id(&self, name: &str) -> Option<i64> {
            self.song_id_map.get(name).copied()
        }

        pub fn setlist_id(&self, name: &str) -> Option<i64> {
            self.setlist_id_map.get(name).copied()
        }

        pub async fn profile(&self, email: &str) -> Result<User, AppError> {
            let id = self
                .profile_id(email)
                .ok_or_else(|| AppError::NotFound(format!("No test profile for {}", email)))?;
            get_profile(&self.pool, self.scheme, id).await
        }
    }

    pub fn upcoming_date(days: i64) -> NaiveDate {
        Utc::now().date_naive() + Duration::days(days)
    }
}

#[cfg(test)]
pub mod test_utils {
    pub use super::test_db::*;

    use crate::api::LoginResponse;
    use crate::catalog::MusicalKey;
    use crate::config::AppConfig;
    use crate::init_rocket;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;

    /// Admin, editor and reader users, two categories, four songs and one
    /// upcoming setlist holding the first three songs.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .admin("admin@iglesia.test", "Ana")
            .editor("editor@iglesia.test", "Esteban")
            .reader("lector@iglesia.test", "Lucia")
            .song_type("Adoración")
            .song_type("Alabanza")
            .song_with(
                "Cuan Grande Es Él",
                "Tradicional",
                MusicalKey::G,
                Some("Adoración"),
                Some("admin@iglesia.test"),
            )
            .song_with(
                "Sublime Gracia",
                "John Newton",
                MusicalKey::D,
                Some("Adoración"),
                Some("admin@iglesia.test"),
            )
            .song_with(
                "Cristo Vive",
                "Marcos Witt",
                MusicalKey::A,
                Some("Alabanza"),
                Some("editor@iglesia.test"),
            )
            .song_with(
                "Renuévame",
                "Marcos Witt",
                MusicalKey::E,
                None,
                Some("admin@iglesia.test"),
            )
            .setlist(
                "Domingo de Pascua",
                upcoming_date(7),
                Some("admin@iglesia.test"),
                &["Cuan Grande Es Él", "Sublime Gracia", "Cristo Vive"],
            )
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let config = AppConfig {
            role_scheme: test_db.scheme,
            ..AppConfig::default()
        };

        let rocket = init_rocket(test_db.pool.clone(), config).await;
        let client = Client::tracked(rocket)
            .await
            .expect("Failed to build test client");

        (client, test_db)
    }

    /// Signs in through the API; the tracked client keeps the session cookie.
    pub async fn login_test_user(client: &Client, email: &str, password: &str) -> LoginResponse {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "email": email, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);

        response
            .into_json::<LoginResponse>()
            .await
            .expect("Login response was not JSON")
    }
}
