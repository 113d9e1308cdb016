use std::fmt::{self, Display, Formatter};

use addman_core::{
    addon_manager::{AddonStatus, ProviderState, ProviderStatus, UpdateSummary},
    inventory::{LocalAddon, ScannedAddon},
};
use camino::Utf8Path;
use ptree::{TreeBuilder, item::StringItem};

#[derive(Debug, Default, Eq, PartialEq)]
struct ScalarStats {
    num_addons_installed: usize,
    num_libraries: usize,
    num_up_to_date: usize,
    num_needing_update: usize,
    num_needing_provider_choice: usize,
    num_without_provider: usize,
    num_unreadable: usize,
}

impl ScalarStats {
    fn new(statuses: &[AddonStatus]) -> Self {
        let mut stats = Self::default();

        for status in statuses {
            stats.num_addons_installed += 1;

            if let ScannedAddon::Valid(addon) = &status.addon {
                if addon.is_library {
                    stats.num_libraries += 1;
                }
            }

            match &status.provider {
                ProviderState::Unchecked => stats.num_unreadable += 1,
                ProviderState::NoProvider => stats.num_without_provider += 1,
                ProviderState::Ambiguous(_) => stats.num_needing_provider_choice += 1,
                ProviderState::Single(p) | ProviderState::Stored(p) => match p.up_to_date {
                    true => stats.num_up_to_date += 1,
                    false => stats.num_needing_update += 1,
                },
            }
        }

        stats
    }
}

impl Display for ScalarStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Number of add-ons installed: {} ({} libraries)",
            self.num_addons_installed, self.num_libraries
        )?;
        writeln!(f, "Up to date: {}", self.num_up_to_date)?;
        writeln!(f, "Needing an update: {}", self.num_needing_update)?;
        writeln!(
            f,
            "Needing a provider choice: {}",
            self.num_needing_provider_choice
        )?;
        writeln!(f, "Not on esoui.com: {}", self.num_without_provider)?;
        writeln!(f, "Unreadable: {}", self.num_unreadable)
    }
}

/// Everything the `status` command prints.
#[derive(Debug)]
pub(crate) struct AddonStats<'a> {
    addon_dir: &'a Utf8Path,
    scalars: ScalarStats,
    statuses: &'a [AddonStatus],
}

impl<'a> AddonStats<'a> {
    pub(crate) fn new(addon_dir: &'a Utf8Path, statuses: &'a [AddonStatus]) -> Self {
        Self {
            addon_dir,
            scalars: ScalarStats::new(statuses),
            statuses,
        }
    }

    fn tree(&self) -> StringItem {
        let mut p_tree = TreeBuilder::new(format!("Installed Add-ons ({})", self.addon_dir));

        for status in self.statuses {
            match &status.addon {
                ScannedAddon::Invalid { name, err } => {
                    p_tree.add_empty_child(format!("{name} (unreadable: {err})"));
                },
                ScannedAddon::Valid(addon) => {
                    p_tree.begin_child(addon_label(addon));
                    p_tree.add_empty_child(provider_label(&status.provider));

                    if !addon.dependencies.is_empty() {
                        p_tree.begin_child("depends on".to_string());
                        for dep in addon.dependencies.iter() {
                            p_tree.add_empty_child(match dep.minimum_version {
                                0 => dep.name.clone(),
                                v => format!("{} >= {}", dep.name, v),
                            });
                        }
                        p_tree.end_child();
                    }

                    p_tree.end_child();
                },
            }
        }

        p_tree.build()
    }
}

fn addon_label(addon: &LocalAddon) -> String {
    let mut label = addon.name.clone();

    if !addon.title.is_empty() && addon.title != addon.name {
        label.push_str(&format!(" \"{}\"", addon.title));
    }

    if !addon.display_version.is_empty() {
        label.push_str(&format!(" {}", addon.display_version));
    }

    if addon.is_library {
        label.push_str(" [library]");
    }

    label
}

fn provider_label(provider: &ProviderState) -> String {
    let up_to_date = |p: &ProviderStatus| match p.up_to_date {
        true => "up to date",
        false => "update available",
    };

    match provider {
        ProviderState::Unchecked => "not checked".to_string(),
        ProviderState::NoProvider => "not on esoui.com".to_string(),
        ProviderState::Single(p) => format!("{} ({}): {}", p.title, p.id, up_to_date(p)),
        ProviderState::Stored(p) => {
            format!("{} ({}, chosen earlier): {}", p.title, p.id, up_to_date(p))
        },
        ProviderState::Ambiguous(candidates) => {
            let candidates = candidates
                .iter()
                .map(|(id, title)| format!("{title} ({id})"))
                .collect::<Vec<_>>()
                .join(", ");

            format!("provider needs choosing on the next update: {candidates}")
        },
    }
}

impl Display for AddonStats<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.statuses.is_empty() {
            return writeln!(f, "No add-ons installed in {}.", self.addon_dir);
        }

        write!(f, "{}", self.scalars)?;

        let mut buf = Vec::new();
        ptree::write_tree(&self.tree(), &mut buf).map_err(|_| fmt::Error)?;
        write!(f, "{}", String::from_utf8_lossy(&buf))
    }
}

/// What the `update` command prints once it's done.
#[derive(Debug)]
pub(crate) struct UpdateReport<'a>(pub(crate) &'a UpdateSummary);

impl Display for UpdateReport<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let summary = self.0;

        match summary.installed.is_empty() && summary.failed.is_empty() {
            true => writeln!(f, "Nothing needed installing.")?,
            false => writeln!(
                f,
                "Installed {} add-ons in {} passes.",
                summary.installed.len(),
                summary.passes
            )?,
        }

        if !summary.failed.is_empty() {
            writeln!(f, "Failed to install {}:", summary.failed.len())?;
            for failure in summary.failed.iter() {
                writeln!(f, "  '{}': {}", failure.title, failure.reason)?;
            }
        }

        if !summary.warnings.is_empty() {
            writeln!(f, "Warnings:")?;
            for warning in summary.warnings.iter() {
                writeln!(f, "  {}", warning)?;
            }
        }

        Ok(())
    }
}
