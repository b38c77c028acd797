#[cfg(test)]
mod tests {
    use serial_test::serial;

    use crate::auth::{Role, RoleScheme};
    use crate::config::AppConfig;

    #[test]
    #[serial]
    fn test_defaults_without_environment() {
        temp_env::with_vars_unset(
            [
                "REPERTOIRE_ROLE_SCHEME",
                "REPERTOIRE_DEFAULT_ROLE",
                "REPERTOIRE_REDIRECT_DELAY_MS",
                "REPERTOIRE_SESSION_HOURS",
            ],
            || {
                let config = AppConfig::from_env().unwrap();

                assert_eq!(config.role_scheme, RoleScheme::EditorReader);
                assert_eq!(config.redirect_delay_ms, 2000);
                assert_eq!(config.session_ttl(), chrono::Duration::hours(1));
                assert_eq!(config.provisioning_role(), Role::Reader);
            },
        );
    }

    #[test]
    #[serial]
    fn test_scheme_and_default_role_from_environment() {
        temp_env::with_vars(
            [
                ("REPERTOIRE_ROLE_SCHEME", Some("leader_multimedia")),
                ("REPERTOIRE_DEFAULT_ROLE", Some("Lider")),
                ("REPERTOIRE_REDIRECT_DELAY_MS", Some("500")),
            ],
            || {
                let config = AppConfig::from_env().unwrap();

                assert_eq!(config.role_scheme, RoleScheme::LeaderMultimedia);
                assert_eq!(config.redirect_delay_ms, 500);
                assert_eq!(config.provisioning_role(), Role::Leader);
            },
        );
    }

    #[test]
    #[serial]
    fn test_default_role_outside_scheme_falls_back() {
        temp_env::with_vars(
            [
                ("REPERTOIRE_ROLE_SCHEME", Some("leader_multimedia")),
                ("REPERTOIRE_DEFAULT_ROLE", Some("Lector")),
            ],
            || {
                let config = AppConfig::from_env().unwrap();

                assert_eq!(config.provisioning_role(), Role::Multimedia);
            },
        );
    }

    #[test]
    #[serial]
    fn test_unknown_scheme_is_an_error() {
        temp_env::with_var("REPERTOIRE_ROLE_SCHEME", Some("everyone"), || {
            assert!(AppConfig::from_env().is_err());
        });
    }

    #[test]
    #[serial]
    fn test_deployment_environment_follows_rocket_profile() {
        temp_env::with_var("ROCKET_PROFILE", Some("production"), || {
            assert_eq!(crate::telemetry::deployment_environment(), "production");
        });
        temp_env::with_var("ROCKET_PROFILE", Some("debug"), || {
            assert_eq!(crate::telemetry::deployment_environment(), "development");
        });
        temp_env::with_var_unset("ROCKET_PROFILE", || {
            assert_eq!(crate::telemetry::deployment_environment(), "development");
        });
    }
}
