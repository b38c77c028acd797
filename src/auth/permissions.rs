use anyhow::Error;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewContent,

    CreateSongs,
    EditSongs,
    DeleteSongs,
    ManageSetlists,

    ManageSongTypes,
    ManageUsers,
}

/// Every role value that appears in either deployment scheme. Which of them are
/// meaningful is decided by the active [`RoleScheme`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Admin")]
    Admin,
    #[serde(rename = "Editor y Creador")]
    EditorCreator,
    #[serde(rename = "Lector")]
    Reader,
    #[serde(rename = "Lider")]
    Leader,
    #[serde(rename = "Multimedia")]
    Multimedia,
}

/// The two role partitions the application has shipped with. Chosen once per
/// deployment; the schemes are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoleScheme {
    /// Admin | Editor y Creador | Lector
    #[default]
    EditorReader,
    /// Admin | Lider | Multimedia
    LeaderMultimedia,
}

static NO_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(HashSet::new);

static VIEWER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewContent);

    permissions
});

static EDITOR_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(VIEWER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::CreateSongs);
    permissions.insert(Permission::ManageSetlists);

    permissions
});

// Leaders manage songs as a single capability: create, edit and delete together.
static LEADER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(VIEWER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::CreateSongs);
    permissions.insert(Permission::EditSongs);
    permissions.insert(Permission::DeleteSongs);
    permissions.insert(Permission::ManageSetlists);
    permissions.insert(Permission::ManageSongTypes);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(EDITOR_PERMISSIONS.iter().copied());
    permissions.extend(LEADER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ManageUsers);

    permissions
});

impl RoleScheme {
    pub fn roles(&self) -> &'static [Role] {
        match self {
            RoleScheme::EditorReader => &[Role::Admin, Role::EditorCreator, Role::Reader],
            RoleScheme::LeaderMultimedia => &[Role::Admin, Role::Leader, Role::Multimedia],
        }
    }

    pub fn contains(&self, role: Role) -> bool {
        self.roles().contains(&role)
    }

    /// Least privileged role of the scheme, handed to auto-provisioned profiles.
    pub fn default_role(&self) -> Role {
        match self {
            RoleScheme::EditorReader => Role::Reader,
            RoleScheme::LeaderMultimedia => Role::Multimedia,
        }
    }

    /// Parses a stored role string, accepting only roles that belong to this scheme.
    pub fn parse_role(&self, s: &str) -> Result<Role, Error> {
        let role = Role::from_str(s)?;
        if self.contains(role) {
            Ok(role)
        } else {
            Err(Error::msg(format!(
                "Role '{}' is not part of the {} scheme",
                s,
                self.as_str()
            )))
        }
    }

    /// Roles outside the scheme get an empty set.
    pub fn permissions(&self, role: Role) -> &'static HashSet<Permission> {
        if !self.contains(role) {
            return &NO_PERMISSIONS;
        }

        match role {
            Role::Admin => &ADMIN_PERMISSIONS,
            Role::EditorCreator => &EDITOR_PERMISSIONS,
            Role::Leader => &LEADER_PERMISSIONS,
            Role::Reader | Role::Multimedia => &VIEWER_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.permissions(role).contains(&permission)
    }

    pub fn can_manage_users(&self, role: Role) -> bool {
        self.has_permission(role, Permission::ManageUsers)
    }

    pub fn can_manage_song_types(&self, role: Role) -> bool {
        self.has_permission(role, Permission::ManageSongTypes)
    }

    pub fn can_create_songs(&self, role: Role) -> bool {
        self.has_permission(role, Permission::CreateSongs)
    }

    pub fn can_edit_songs(&self, role: Role) -> bool {
        self.has_permission(role, Permission::EditSongs)
    }

    pub fn can_delete_songs(&self, role: Role) -> bool {
        self.has_permission(role, Permission::DeleteSongs)
    }

    pub fn can_manage_songs(&self, role: Role) -> bool {
        self.can_create_songs(role) && self.can_edit_songs(role) && self.can_delete_songs(role)
    }

    pub fn can_manage_setlists(&self, role: Role) -> bool {
        self.has_permission(role, Permission::ManageSetlists)
    }

    pub fn can_view_content(&self, role: Role) -> bool {
        self.has_permission(role, Permission::ViewContent)
    }

    pub fn capabilities(&self, role: Role) -> Capabilities {
        Capabilities {
            can_manage_users: self.can_manage_users(role),
            can_manage_song_types: self.can_manage_song_types(role),
            can_create_songs: self.can_create_songs(role),
            can_edit_songs: self.can_edit_songs(role),
            can_delete_songs: self.can_delete_songs(role),
            can_manage_setlists: self.can_manage_setlists(role),
            can_view_content: self.can_view_content(role),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleScheme::EditorReader => "editor_reader",
            RoleScheme::LeaderMultimedia => "leader_multimedia",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "editor_reader" => Ok(RoleScheme::EditorReader),
            "leader_multimedia" => Ok(RoleScheme::LeaderMultimedia),
            _ => Err(Error::msg(format!("Unknown role scheme: {}", s))),
        }
    }
}

/// Flattened capability answers, sent to clients so they can decide which
/// controls to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_manage_users: bool,
    pub can_manage_song_types: bool,
    pub can_create_songs: bool,
    pub can_edit_songs: bool,
    pub can_delete_songs: bool,
    pub can_manage_setlists: bool,
    pub can_view_content: bool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::EditorCreator => "Editor y Creador",
            Role::Reader => "Lector",
            Role::Leader => "Lider",
            Role::Multimedia => "Multimedia",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Editor y Creador" => Ok(Role::EditorCreator),
            "Lector" => Ok(Role::Reader),
            "Lider" => Ok(Role::Leader),
            "Multimedia" => Ok(Role::Multimedia),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrador",
            Role::EditorCreator => "Editor y Creador",
            Role::Reader => "Lector",
            Role::Leader => "Líder",
            Role::Multimedia => "Multimedia",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => {
                "Acceso completo al sistema. Puede gestionar usuarios, tipos de canciones y todas las operaciones con canciones."
            }
            Role::EditorCreator => {
                "Puede crear nuevas canciones. No puede editar, eliminar ni gestionar usuarios o tipos."
            }
            Role::Reader => {
                "Acceso de solo lectura. Puede ver todas las canciones y usar los filtros de búsqueda."
            }
            Role::Leader => {
                "Puede gestionar canciones, tipos de canciones y listas de reunión. No puede gestionar usuarios."
            }
            Role::Multimedia => {
                "Acceso de solo lectura. Puede ver canciones y listas para preparar la proyección."
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for RoleScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
