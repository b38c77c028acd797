use std::time::Duration;

use chrono::Utc;
use rocket::FromForm;
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use tracing::{error, info, warn};
use validator::{Validate, ValidateUrl};

use crate::auth::{
    AccountUpdate, Capabilities, Identity, Permission, SESSION_COOKIE, User, resolve_profile,
};
use crate::catalog::{MusicalKey, SongFilter};
use crate::config::AppConfig;
use crate::db::{
    NewProfile, ProfileUpdate, attach_creators, create_profile, create_song, create_song_type,
    delete_profile, delete_setlist, delete_song, delete_song_type, find_account_by_email,
    get_all_profiles, get_all_song_types, get_all_songs, get_profile,
    get_setlist, get_setlist_detail, get_setlist_songs, get_song, get_song_summaries, get_song_type,
    get_upcoming_setlists, profile_leads_setlists, profile_owns_songs, update_profile,
    update_song, update_song_type,
};
use crate::models::{Setlist, SetlistDetail, Song, SongFields, SongSummary, SongType};
use crate::setlist::{
    ComposerOp, Feedback, NoticeKind, SETLISTS_PATH, SetlistComposer, SetlistForm,
    SetlistSubmission, SubmissionError,
};
use crate::validation::{
    ApiError, AppErrorExt, JsonValidateExt, PermissionCheckExt, ToValidationResponse, api_error,
};

const SELF_DELETE_MESSAGE: &str = "No puedes eliminarte a ti mismo";
const OWNS_SONGS_MESSAGE: &str = "No puedes eliminar este usuario porque tiene canciones creadas";
const LEADS_SETLISTS_MESSAGE: &str =
    "No puedes eliminar este usuario porque tiene listas asignadas";

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Correo electrónico no válido"))]
    email: String,
    #[validate(length(min = 1, message = "La contraseña es obligatoria"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
    pub redirect_url: Option<String>,
}

/// A profile as clients see it, with its role spelled out for display.
#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub role_label: String,
    pub role_description: String,
    pub capabilities: Capabilities,
    pub created_at: String,
}

impl From<&User> for UserData {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            user_id: user.user_id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            role_label: user.role.label().to_string(),
            role_description: user.role.description().to_string(),
            capabilities: user.capabilities(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .same_site(SameSite::Lax)
        .http_only(true)
        .max_age(rocket::time::Duration::hours(config.session_ttl().num_hours()))
        .build()
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    identity: &State<Identity>,
    config: &State<AppConfig>,
) -> Result<Json<LoginResponse>, ApiError> {
    let validated = login.validate_custom()?;

    let session = identity
        .sign_in(&validated.email, &validated.password)
        .await
        .validate_custom()?;

    match session {
        Some(session) => {
            let user = resolve_profile(db, config, session.account_id)
                .await
                .validate_custom()?;

            cookies.add_private(session_cookie(session.token, config));
            info!(email = %user.email, "User signed in");

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(&user)),
                error: None,
                redirect_url: Some("/dashboard".to_string()),
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Correo electrónico o contraseña incorrectos".to_string()),
            redirect_url: None,
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, identity: &State<Identity>) -> Status {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(err) = identity.sign_out(&token).await {
            err.log_and_record("Signing out");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Status::Ok
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(&user))
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[derive(Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Correo electrónico no válido"))]
    email: String,
}

#[post("/password-reset", data = "<request>")]
pub async fn api_password_reset(
    request: Json<PasswordResetRequest>,
    identity: &State<Identity>,
) -> Result<Status, ApiError> {
    let validated = request.validate_custom()?;

    identity
        .send_password_reset(&validated.email)
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

#[derive(Deserialize, Validate)]
pub struct PasswordResetCompleteRequest {
    #[validate(length(min = 1))]
    token: String,
    #[validate(length(min = 6, message = "La contraseña debe tener al menos 6 caracteres"))]
    password: String,
}

#[post("/password-reset/complete", data = "<request>")]
pub async fn api_password_reset_complete(
    request: Json<PasswordResetCompleteRequest>,
    identity: &State<Identity>,
) -> Result<Status, ApiError> {
    let validated = request.validate_custom()?;

    identity
        .complete_password_reset(&validated.token, &validated.password)
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

#[derive(Deserialize, Validate)]
pub struct PasswordChangeRequest {
    #[validate(length(min = 6, message = "La contraseña debe tener al menos 6 caracteres"))]
    new_password: String,
}

#[post("/change-password", data = "<password>")]
pub async fn api_change_password(
    password: Json<PasswordChangeRequest>,
    user: User,
    identity: &State<Identity>,
) -> Result<Status, ApiError> {
    let validated = password.validate_custom()?;

    identity
        .update_password(user.user_id, &validated.new_password)
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

#[get("/users")]
pub async fn api_get_users(
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<Vec<UserData>>, ApiError> {
    user.require_permission(Permission::ManageUsers)
        .validate_custom()?;

    let users = get_all_profiles(db, config.role_scheme)
        .await
        .validate_custom()?;

    Ok(Json(users.iter().map(UserData::from).collect()))
}

#[derive(Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Correo electrónico no válido"))]
    email: String,
    #[validate(length(min = 6, message = "La contraseña debe tener al menos 6 caracteres"))]
    password: String,
    #[validate(length(min = 1, message = "El nombre es obligatorio"))]
    first_name: String,
    #[validate(length(min = 1, message = "El apellido es obligatorio"))]
    last_name: String,
    role: String,
}

fn parse_role(config: &AppConfig, role: &str) -> Result<crate::auth::Role, ApiError> {
    config.role_scheme.parse_role(role).map_err(|err| {
        warn!(role, error = %err, "Rejected role");
        api_error(Status::UnprocessableEntity, "role", "Rol no válido")
    })
}

#[post("/users", data = "<request>")]
pub async fn api_create_user(
    request: Json<CreateUserRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    identity: &State<Identity>,
    config: &State<AppConfig>,
) -> Result<Custom<Json<UserData>>, ApiError> {
    user.require_permission(Permission::ManageUsers)
        .validate_custom()?;
    let validated = request.validate_custom()?;
    let role = parse_role(config, &validated.role)?;

    let existing = find_account_by_email(db, &validated.email)
        .await
        .validate_custom()?;

    let (account_id, fresh_account) = match existing {
        Some(account) => (account.id, false),
        None => {
            let account = identity
                .create_user(&validated.email, &validated.password)
                .await
                .validate_custom()?;
            (account.id, true)
        }
    };

    let profile = NewProfile {
        user_id: account_id,
        first_name: validated.first_name.trim().to_string(),
        last_name: validated.last_name.trim().to_string(),
        email: validated.email.trim().to_lowercase(),
        role,
    };

    let profile_id = match create_profile(db, &profile).await {
        Ok(id) => id,
        Err(err) => {
            if fresh_account {
                if let Err(cleanup) = identity.delete_user(account_id).await {
                    error!(account_id, error = %cleanup, "Failed to roll back identity account");
                }
            }
            return Err(err.to_validation_response());
        }
    };

    let created = get_profile(db, config.role_scheme, profile_id)
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(UserData::from(&created))))
}

#[derive(Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "El nombre es obligatorio"))]
    first_name: String,
    #[validate(length(min = 1, message = "El apellido es obligatorio"))]
    last_name: String,
    #[validate(email(message = "Correo electrónico no válido"))]
    email: String,
    role: String,
    #[validate(length(min = 6, message = "La contraseña debe tener al menos 6 caracteres"))]
    password: Option<String>,
}

#[put("/users/<id>", data = "<request>")]
pub async fn api_update_user(
    id: i64,
    request: Json<UpdateUserRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    identity: &State<Identity>,
    config: &State<AppConfig>,
) -> Result<Json<UserData>, ApiError> {
    user.require_permission(Permission::ManageUsers)
        .validate_custom()?;
    let validated = request.validate_custom()?;
    let role = parse_role(config, &validated.role)?;

    let profile = get_profile(db, config.role_scheme, id)
        .await
        .validate_custom()?;
    let email = validated.email.trim().to_lowercase();

    let account_update = AccountUpdate {
        email: (email != profile.email).then(|| email.clone()),
        password: validated.password.clone(),
    };

    update_profile(
        db,
        id,
        &ProfileUpdate {
            first_name: validated.first_name.trim().to_string(),
            last_name: validated.last_name.trim().to_string(),
            email,
            role,
        },
    )
    .await
    .validate_custom()?;

    if let Err(err) = identity
        .update_user_by_id(profile.user_id, &account_update)
        .await
    {
        let previous = ProfileUpdate {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            email: profile.email.clone(),
            role: profile.role,
        };
        if let Err(restore) = update_profile(db, id, &previous).await {
            error!(profile_id = id, error = %restore, "Failed to restore profile");
        }
        return Err(err.to_validation_response());
    }

    let updated = get_profile(db, config.role_scheme, id)
        .await
        .validate_custom()?;

    Ok(Json(UserData::from(&updated)))
}

#[delete("/users/<id>")]
pub async fn api_delete_user(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
    identity: &State<Identity>,
    config: &State<AppConfig>,
) -> Result<Status, ApiError> {
    user.require_permission(Permission::ManageUsers)
        .validate_custom()?;

    if id == user.id {
        return Err(api_error(Status::BadRequest, "user", SELF_DELETE_MESSAGE));
    }

    if profile_owns_songs(db, id).await.validate_custom()? {
        return Err(api_error(Status::Conflict, "user", OWNS_SONGS_MESSAGE));
    }

    if profile_leads_setlists(db, id).await.validate_custom()? {
        return Err(api_error(Status::Conflict, "user", LEADS_SETLISTS_MESSAGE));
    }

    let profile = get_profile(db, config.role_scheme, id)
        .await
        .validate_custom()?;

    identity
        .delete_user(profile.user_id)
        .await
        .validate_custom()?;
    delete_profile(db, id).await.validate_custom()?;

    info!(profile_id = id, "User deleted");
    Ok(Status::Ok)
}

#[derive(Deserialize, Validate)]
pub struct SongTypeRequest {
    #[validate(length(min = 1, message = "El nombre es obligatorio"))]
    name: String,
    description: Option<String>,
}

#[get("/song-types")]
pub async fn api_get_song_types(
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<SongType>>, Status> {
    let song_types = get_all_song_types(db).await?;
    Ok(Json(song_types))
}

#[post("/song-types", data = "<request>")]
pub async fn api_create_song_type(
    request: Json<SongTypeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<SongType>>, ApiError> {
    user.require_permission(Permission::ManageSongTypes)
        .validate_custom()?;
    let validated = request.validate_custom()?;

    let id = create_song_type(db, validated.name.trim(), validated.description.as_deref())
        .await
        .validate_custom()?;
    let song_type = get_song_type(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(song_type)))
}

#[put("/song-types/<id>", data = "<request>")]
pub async fn api_update_song_type(
    id: i64,
    request: Json<SongTypeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SongType>, ApiError> {
    user.require_permission(Permission::ManageSongTypes)
        .validate_custom()?;
    let validated = request.validate_custom()?;

    update_song_type(
        db,
        id,
        validated.name.trim(),
        validated.description.as_deref(),
    )
    .await
    .validate_custom()?;

    Ok(Json(get_song_type(db, id).await.validate_custom()?))
}

#[delete("/song-types/<id>")]
pub async fn api_delete_song_type(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    user.require_permission(Permission::ManageSongTypes)
        .validate_custom()?;

    delete_song_type(db, id).await.validate_custom()?;

    Ok(Status::Ok)
}

#[derive(FromForm)]
pub struct SongsQueryParams {
    search: Option<String>,
    song_type_id: Option<i64>,
    key: Option<String>,
    leader_id: Option<i64>,
}

impl SongsQueryParams {
    fn into_filter(self) -> Result<SongFilter, ApiError> {
        let key = match self.key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Some(MusicalKey::from_str(key).map_err(|_| {
                api_error(Status::UnprocessableEntity, "key", "Tonalidad no válida")
            })?),
            None => None,
        };

        Ok(SongFilter {
            search: self.search,
            song_type_id: self.song_type_id,
            key,
            leader_id: self.leader_id,
        })
    }
}

#[get("/songs?<params..>")]
pub async fn api_get_songs(
    params: SongsQueryParams,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Song>>, ApiError> {
    let filter = params.into_filter()?;

    let songs = get_all_songs(db).await.validate_custom()?;
    let songs = attach_creators(db, filter.apply(songs)).await;

    Ok(Json(songs))
}

#[get("/songs/<id>")]
pub async fn api_get_song(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Song>, ApiError> {
    let song = get_song(db, id).await.validate_custom()?;
    let mut songs = attach_creators(db, vec![song]).await;

    match songs.pop() {
        Some(song) => Ok(Json(song)),
        None => Err(Status::NotFound.to_validation_response()),
    }
}

#[derive(Deserialize, Validate)]
pub struct SongRequest {
    #[validate(length(min = 1, message = "El nombre es obligatorio"))]
    name: String,
    #[validate(length(min = 1, message = "El artista es obligatorio"))]
    artist: String,
    key: String,
    #[serde(default)]
    lyrics: String,
    youtube_link: Option<String>,
    multitrack_link: Option<String>,
    chord_chart_link: Option<String>,
    song_type_id: Option<i64>,
}

/// Blank links count as absent; anything else must be a URL.
fn optional_link(field: &str, value: Option<String>) -> Result<Option<String>, ApiError> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(link) if !link.validate_url() => Err(api_error(
            Status::UnprocessableEntity,
            field,
            "Enlace no válido",
        )),
        link => Ok(link),
    }
}

impl SongRequest {
    fn into_fields(self) -> Result<SongFields, ApiError> {
        let key = MusicalKey::from_str(self.key.trim())
            .map_err(|_| api_error(Status::UnprocessableEntity, "key", "Tonalidad no válida"))?;

        Ok(SongFields {
            name: self.name.trim().to_string(),
            artist: self.artist.trim().to_string(),
            key,
            lyrics: self.lyrics,
            youtube_link: optional_link("youtube_link", self.youtube_link)?,
            multitrack_link: optional_link("multitrack_link", self.multitrack_link)?,
            chord_chart_link: optional_link("chord_chart_link", self.chord_chart_link)?,
            song_type_id: self.song_type_id,
        })
    }
}

#[post("/songs", data = "<request>")]
pub async fn api_create_song(
    request: Json<SongRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Song>>, ApiError> {
    user.require_permission(Permission::CreateSongs)
        .validate_custom()?;
    let fields = request.validate_custom()?.into_fields()?;

    let id = create_song(db, &fields, user.id).await.validate_custom()?;
    let song = get_song(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(song)))
}

#[put("/songs/<id>", data = "<request>")]
pub async fn api_update_song(
    id: i64,
    request: Json<SongRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Song>, ApiError> {
    user.require_permission(Permission::EditSongs)
        .validate_custom()?;
    let fields = request.validate_custom()?.into_fields()?;

    update_song(db, id, &fields).await.validate_custom()?;

    Ok(Json(get_song(db, id).await.validate_custom()?))
}

#[delete("/songs/<id>")]
pub async fn api_delete_song(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    user.require_permission(Permission::DeleteSongs)
        .validate_custom()?;

    delete_song(db, id).await.validate_custom()?;

    Ok(Status::Ok)
}

#[get("/setlists")]
pub async fn api_get_setlists(
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Setlist>>, Status> {
    let today = Utc::now().date_naive();
    let setlists = get_upcoming_setlists(db, today).await?;
    Ok(Json(setlists))
}

#[get("/setlists/<id>")]
pub async fn api_get_setlist(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SetlistDetail>, ApiError> {
    let detail = get_setlist_detail(db, id).await.validate_custom()?;
    Ok(Json(detail))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ComposerSong {
    pub position: i64,
    pub is_offering: bool,
    pub song: SongSummary,
}

/// What a setlist editor needs to render: the ordered selection and the
/// songs still available to add.
#[derive(Serialize, Deserialize, Debug)]
pub struct ComposerResponse {
    pub song_ids: Vec<i64>,
    pub selected: Vec<ComposerSong>,
    pub available: Vec<SongSummary>,
    pub search: String,
}

impl From<&SetlistComposer> for ComposerResponse {
    fn from(composer: &SetlistComposer) -> Self {
        Self {
            song_ids: composer.selected_ids().to_vec(),
            selected: composer
                .selected_songs()
                .into_iter()
                .enumerate()
                .map(|(index, song)| ComposerSong {
                    position: index as i64 + 1,
                    is_offering: composer.is_offering(song.id),
                    song: song.clone(),
                })
                .collect(),
            available: composer.filtered_songs().into_iter().cloned().collect(),
            search: composer.search_term().to_string(),
        }
    }
}

#[get("/setlists/composer?<search>")]
pub async fn api_new_setlist_composer(
    search: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ComposerResponse>, ApiError> {
    user.require_permission(Permission::ManageSetlists)
        .validate_custom()?;

    let mut composer = SetlistComposer::new(get_song_summaries(db).await.validate_custom()?);
    composer.set_search_term(search.as_deref().unwrap_or_default());

    Ok(Json(ComposerResponse::from(&composer)))
}

#[get("/setlists/<id>/composer?<search>")]
pub async fn api_setlist_composer(
    id: i64,
    search: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ComposerResponse>, ApiError> {
    user.require_permission(Permission::ManageSetlists)
        .validate_custom()?;

    let candidates = get_song_summaries(db).await.validate_custom()?;
    get_setlist(db, id).await.validate_custom()?;
    let rows = get_setlist_songs(db, id).await.validate_custom()?;

    let mut composer = SetlistComposer::with_selection(
        candidates,
        rows.iter().map(|row| row.song_id),
        rows.iter().filter(|row| row.is_offering).map(|row| row.song_id),
    );
    composer.set_search_term(search.as_deref().unwrap_or_default());

    Ok(Json(ComposerResponse::from(&composer)))
}

#[derive(Deserialize, Debug)]
pub struct ComposerEditRequest {
    #[serde(default)]
    song_ids: Vec<i64>,
    #[serde(default)]
    offering_song_ids: Vec<i64>,
    #[serde(default)]
    search: String,
    #[serde(default)]
    ops: Vec<ComposerOp>,
}

/// Applies editing steps to a posted selection and answers with the resulting
/// composer state. Nothing is stored.
#[post("/setlists/composer", data = "<request>")]
pub async fn api_edit_setlist_composer(
    request: Json<ComposerEditRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ComposerResponse>, ApiError> {
    user.require_permission(Permission::ManageSetlists)
        .validate_custom()?;
    let request = request.into_inner();

    let candidates = get_song_summaries(db).await.validate_custom()?;
    let mut composer = SetlistComposer::from_submission(
        candidates,
        &request.song_ids,
        &request.offering_song_ids,
    )
    .map_err(|err| SubmissionError::from(err).to_validation_response())?;

    for op in request.ops {
        composer.apply(op);
    }
    composer.set_search_term(&request.search);

    Ok(Json(ComposerResponse::from(&composer)))
}

#[derive(Deserialize, Debug)]
pub struct SetlistRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    service_type: String,
    notes: Option<String>,
    #[serde(default)]
    song_ids: Vec<i64>,
    #[serde(default)]
    offering_song_ids: Vec<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SubmissionResponse {
    pub success: bool,
    pub message: String,
    pub setlist_id: i64,
    pub redirect_url: String,
    pub redirect_delay_ms: u64,
}

/// Collects the notice and navigation a submission asks for, so they can be
/// returned to the client in the response body.
#[derive(Debug, Default)]
struct ResponseFeedback {
    notice: Option<(String, NoticeKind)>,
    redirect: Option<(String, Duration)>,
}

impl Feedback for ResponseFeedback {
    fn notify(&mut self, message: &str, kind: NoticeKind) {
        self.notice = Some((message.to_string(), kind));
    }

    fn navigate(&mut self, path: &str, delay: Duration) {
        self.redirect = Some((path.to_string(), delay));
    }
}

impl ResponseFeedback {
    fn into_response(self, setlist_id: i64) -> SubmissionResponse {
        let (redirect_url, delay) = self
            .redirect
            .unwrap_or_else(|| (SETLISTS_PATH.to_string(), Duration::ZERO));

        SubmissionResponse {
            success: true,
            message: self.notice.map(|(message, _)| message).unwrap_or_default(),
            setlist_id,
            redirect_url,
            redirect_delay_ms: delay.as_millis() as u64,
        }
    }

    fn into_error(self, err: SubmissionError) -> ApiError {
        match err {
            SubmissionError::Store(store_err) => {
                store_err.log_and_record("Saving setlist");
                let message = self.notice.map(|(message, _)| message).unwrap_or_default();
                api_error(store_err.status_code(), "setlist", &message)
            }
            other => other.to_validation_response(),
        }
    }
}

async fn submit_setlist(
    mut submission: SetlistSubmission,
    request: SetlistRequest,
    db: &Pool<Sqlite>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let candidates = get_song_summaries(db).await.validate_custom()?;
    let composer = SetlistComposer::from_submission(
        candidates,
        &request.song_ids,
        &request.offering_song_ids,
    )
    .map_err(|err| {
        warn!(error = %err, "Setlist selection rejected");
        SubmissionError::from(err).to_validation_response()
    })?;

    let form = SetlistForm {
        name: request.name,
        date: request.date,
        service_type: request.service_type,
        notes: request.notes,
    };

    let mut feedback = ResponseFeedback::default();
    let result = submission.submit(&form, &composer, db, &mut feedback).await;
    info!(state = ?submission.state(), "Setlist submission finished");

    match result {
        Ok(setlist_id) => Ok(Json(feedback.into_response(setlist_id))),
        Err(err) => Err(feedback.into_error(err)),
    }
}

#[post("/setlists", data = "<request>")]
pub async fn api_create_setlist(
    request: Json<SetlistRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    user.require_permission(Permission::ManageSetlists)
        .validate_custom()?;

    let submission =
        SetlistSubmission::create(user.id, Duration::from_millis(config.redirect_delay_ms));
    submit_setlist(submission, request.into_inner(), db).await
}

#[put("/setlists/<id>", data = "<request>")]
pub async fn api_update_setlist(
    id: i64,
    request: Json<SetlistRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    user.require_permission(Permission::ManageSetlists)
        .validate_custom()?;

    let submission = SetlistSubmission::update(id, Duration::from_millis(config.redirect_delay_ms));
    submit_setlist(submission, request.into_inner(), db).await
}

#[delete("/setlists/<id>")]
pub async fn api_delete_setlist(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    user.require_permission(Permission::ManageSetlists)
        .validate_custom()?;

    delete_setlist(db, id).await.validate_custom()?;

    Ok(Status::Ok)
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
