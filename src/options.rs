use crate::commands::ExportOptions;
use clap::Parser;
use secrecy::SecretString;

#[derive(Debug, Parser)]
#[clap(
    about = env!("CARGO_PKG_DESCRIPTION"),
    after_help = "Example:\n  fikon --file 1LktYuGGSqZ5zwyDnXJmCA --page Icons --output assets/icons --compress"
)]
pub struct Options {
    #[command(flatten)]
    pub global: Global,

    #[command(flatten)]
    pub export: ExportOptions,
}

#[derive(Debug, Parser)]
pub struct Global {
    /// Your Figma personal access token. If not specified, the environment
    /// variable 'FIGMA_TOKEN' is used, which may also be set in a .env file.
    #[clap(long, short, env("FIGMA_TOKEN"), hide_env_values(true))]
    pub token: Option<SecretString>,

    /// Sets verbosity level. Can be specified multiple times to increase the verbosity
    /// of this program.
    #[clap(long = "verbose", short, action(clap::ArgAction::Count))]
    pub verbosity: u8,
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use clap::CommandFactory;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn definition_is_valid() {
        Options::command().debug_assert();
    }

    #[test]
    fn parses_short_flags() {
        let options = Options::try_parse_from([
            "fikon", "-t", "secret", "-f", "abc", "-p", "453:89", "-o", "out", "--compress", "-vv",
        ])
        .unwrap();

        assert_eq!(options.global.token.unwrap().expose_secret(), "secret");
        assert_eq!(options.global.verbosity, 2);
        assert_eq!(options.export.file_key, "abc");
        assert_eq!(options.export.page.as_deref(), Some("453:89"));
        assert_eq!(options.export.output, PathBuf::from("out"));
        assert!(options.export.compress);
        assert!(!options.export.debug);
    }

    #[test]
    fn applies_defaults() {
        let options = Options::try_parse_from(["fikon", "--file", "abc", "--token", "t"]).unwrap();

        assert_eq!(options.export.output, PathBuf::from("assets/icons"));
        assert_eq!(options.export.page, None);
        assert_eq!(options.export.timeout, 60);
        assert_eq!(options.export.concurrency, 8);
    }

    #[test]
    fn file_is_required() {
        assert!(Options::try_parse_from(["fikon", "--token", "t"]).is_err());
    }
}
