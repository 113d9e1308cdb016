use std::{
    env::current_dir,
    fmt::{self, Display},
    ops::Deref,
    str::FromStr,
};

use addman_utils::types::AddonIdentifier;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use log::warn;

static STATE_DIR_NAME: &str = "addman";

/// Keeps Elder Scrolls Online add-ons and their dependencies up to date with esoui.com.
///
/// Every add-on in the add-on directory (and everything those add-ons depend on) is matched against the esoui.com
/// catalog. Anything that is missing or has a newer upload gets installed.
#[derive(Debug, Parser)]
#[clap(verbatim_doc_comment)]
#[command(author, version)]
pub(crate) struct ProgArgs {
    #[command(subcommand)]
    pub(crate) command: Command,

    /// Path to the directory where the config and catalog cache are kept.
    #[arg(short = 'p', long, default_value_t = get_os_default_state_dir_path())]
    pub(crate) state_dir_path: DisplayablePathBuf,

    /// Path to the game's AddOns directory. Asked for on the first run if not given.
    #[arg(short = 'a', long)]
    pub(crate) addon_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Install or update every add-on that is out of date, along with any missing dependencies.
    Update(UpdateArgs),

    /// Show every installed add-on and how it matches the catalog, without changing anything.
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub(crate) struct UpdateArgs {
    #[command(flatten)]
    pub(crate) catalog: CatalogArgs,

    /// Add-ons to (re)install even if they look up to date.
    ///
    /// Each add-on can be specified with either:
    /// - The file ID on esoui.com
    /// - The add-on's directory name (eg. `LibAddonMenu-2.0`)
    #[clap(verbatim_doc_comment)]
    pub(crate) addons: Vec<AddonIdentifier>,
}

#[derive(Args, Debug)]
pub(crate) struct StatusArgs {
    #[command(flatten)]
    pub(crate) catalog: CatalogArgs,
}

#[derive(Args, Clone, Debug)]
pub(crate) struct CatalogArgs {
    /// Fetch the catalog again even if the cached copy is recent.
    #[arg(short = 'r', long)]
    pub(crate) refresh: bool,
}

fn get_os_default_state_dir_path() -> DisplayablePathBuf {
    let base = match dirs::config_dir().and_then(|p| Utf8PathBuf::from_path_buf(p).ok()) {
        Some(p) => p,
        None => {
            warn!(
                "Unable to find a config directory for this OS! Using the current directory instead as a fallback, but this should be considered a bug and be reported to the maintainers."
            );
            current_dir()
                .ok()
                .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
                .unwrap_or_else(|| Utf8PathBuf::from("."))
        },
    };

    base.join(STATE_DIR_NAME).into()
}

#[derive(Clone, Debug)]
pub(crate) struct DisplayablePathBuf(Utf8PathBuf);

impl Display for DisplayablePathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Utf8PathBuf> for DisplayablePathBuf {
    fn from(v: Utf8PathBuf) -> Self {
        Self(v)
    }
}

impl FromStr for DisplayablePathBuf {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let res = Utf8PathBuf::from_str(s)?;
        Ok(Self(res))
    }
}

impl Deref for DisplayablePathBuf {
    type Target = Utf8PathBuf;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use addman_utils::types::AddonIdentifier;
    use clap::{CommandFactory, Parser};

    use super::{Command, ProgArgs};

    #[test]
    fn args_are_well_formed() {
        ProgArgs::command().debug_assert();
    }

    #[test]
    fn update_takes_ids_and_names() {
        let args = ProgArgs::parse_from(["addman", "update", "--refresh", "1245", "LibStub"]);

        match args.command {
            Command::Update(update) => {
                assert!(update.catalog.refresh);
                assert_eq!(
                    update.addons,
                    vec![
                        AddonIdentifier::Id(1245),
                        AddonIdentifier::Path("LibStub".to_string())
                    ]
                );
            },
            Command::Status(_) => panic!("expected the update command"),
        }
    }

    #[test]
    fn state_dir_defaults_to_an_addman_dir() {
        let args = ProgArgs::parse_from(["addman", "status"]);

        assert_eq!(args.state_dir_path.file_name(), Some("addman"));
        assert!(args.addon_dir.is_none());
    }

    #[test]
    fn paths_can_be_overridden() {
        let args = ProgArgs::parse_from(["addman", "-p", "/tmp/state", "-a", "/games/AddOns", "status"]);

        assert_eq!(args.state_dir_path.as_str(), "/tmp/state");
        assert_eq!(args.addon_dir.as_deref().map(|p| p.as_str()), Some("/games/AddOns"));
    }
}
