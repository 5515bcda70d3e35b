// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use std::ops::BitOr;

use tracing::warn;

/// Coarse capability gate for built-in tools.
///
/// A tool is registrable under a grant iff its required set is a subset of
/// the granted set.  An empty requirement (pure tools like `calculate`)
/// passes every gate.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const NONE: Self = Self(0);
    pub const FILESYSTEM: Self = Self(1);
    pub const NETWORK: Self = Self(1 << 1);
    pub const SHELL: Self = Self(1 << 2);
    pub const MEMORY: Self = Self(1 << 3);
    pub const SENSOR: Self = Self(1 << 4);
    pub const GPIO: Self = Self(1 << 5);
    pub const ALL: Self = Self(0b0011_1111);

    /// True when every capability in `required` is present in `self`.
    pub fn contains(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Build a set from config capability names.  Unknown names are skipped
    /// with a warning so a typo cannot silently widen or narrow the grant
    /// beyond the recognised vocabulary.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut set = Self::NONE;
        for name in names {
            set = set
                | match name.as_ref() {
                    "filesystem" => Self::FILESYSTEM,
                    "network" => Self::NETWORK,
                    "shell" => Self::SHELL,
                    "memory" => Self::MEMORY,
                    "sensor" => Self::SENSOR,
                    "gpio" => Self::GPIO,
                    other => {
                        warn!(capability = other, "unknown capability name ignored");
                        Self::NONE
                    }
                };
        }
        set
    }
}

impl BitOr for CapabilitySet {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::FILESYSTEM, "filesystem"),
            (Self::NETWORK, "network"),
            (Self::SHELL, "shell"),
            (Self::MEMORY, "memory"),
            (Self::SENSOR, "sensor"),
            (Self::GPIO, "gpio"),
        ]
        .iter()
        .filter(|(c, _)| self.contains(*c))
        .map(|(_, n)| *n)
        .collect();
        write!(f, "CapabilitySet({})", names.join("|"))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_is_subset_of_everything() {
        assert!(CapabilitySet::NONE.contains(CapabilitySet::NONE));
        assert!(CapabilitySet::ALL.contains(CapabilitySet::NONE));
        assert!(CapabilitySet::FILESYSTEM.contains(CapabilitySet::NONE));
    }

    #[test]
    fn subset_check_is_not_symmetric() {
        let fs_net = CapabilitySet::FILESYSTEM | CapabilitySet::NETWORK;
        assert!(fs_net.contains(CapabilitySet::FILESYSTEM));
        assert!(!CapabilitySet::FILESYSTEM.contains(fs_net));
    }

    #[test]
    fn all_contains_each_capability() {
        for c in [
            CapabilitySet::FILESYSTEM,
            CapabilitySet::NETWORK,
            CapabilitySet::SHELL,
            CapabilitySet::MEMORY,
            CapabilitySet::SENSOR,
            CapabilitySet::GPIO,
        ] {
            assert!(CapabilitySet::ALL.contains(c));
        }
    }

    #[test]
    fn from_names_parses_known_and_skips_unknown() {
        let set = CapabilitySet::from_names(&["filesystem", "bogus", "shell"]);
        assert!(set.contains(CapabilitySet::FILESYSTEM));
        assert!(set.contains(CapabilitySet::SHELL));
        assert!(!set.contains(CapabilitySet::NETWORK));
    }

    #[test]
    fn debug_lists_member_names() {
        let set = CapabilitySet::MEMORY | CapabilitySet::GPIO;
        let s = format!("{set:?}");
        assert!(s.contains("memory"));
        assert!(s.contains("gpio"));
        assert!(!s.contains("shell"));
    }
}
