pub mod auth;
pub mod logging;
pub mod store;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_CORS_ORIGIN: &str = "cors-origin";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("auth-api")
        .about("Challenge-gated password login")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("AUTH_API_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_CORS_ORIGIN)
                .long(ARG_CORS_ORIGIN)
                .help("Allowed CORS origin (default: any)")
                .env("AUTH_API_CORS_ORIGIN"),
        )
        .subcommand(auth::hash_user_command());

    let command = auth::with_args(command);
    let command = store::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "auth-api");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Challenge-gated password login".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_check_port() {
        temp_env::with_vars([("AUTH_API_PORT", None::<&str>)], || {
            let matches = new().get_matches_from(vec!["auth-api"]);
            assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));

            let matches = new().get_matches_from(vec!["auth-api", "--port", "9000"]);
            assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(9000));
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("AUTH_API_PORT", Some("443")),
                ("AUTH_API_CORS_ORIGIN", Some("https://app.example.com")),
                ("AUTH_API_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["auth-api"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>(ARG_CORS_ORIGIN).cloned(),
                    Some("https://app.example.com".to_string())
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("AUTH_API_LOG_LEVEL", Some(level))], || {
                let matches = new().get_matches_from(vec!["auth-api"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5_usize {
            temp_env::with_vars([("AUTH_API_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["auth-api".to_string()];
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_invalid_log_level() {
        temp_env::with_vars([("AUTH_API_LOG_LEVEL", Some("loud"))], || {
            assert!(new().try_get_matches_from(vec!["auth-api"]).is_err());
        });
    }
}
