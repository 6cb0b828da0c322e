//! Unit kinds and who builds them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A producible unit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Income structure.
    Farm,
    /// Builds infecters.
    Laboratory,
    /// Builds soldiers.
    Barracks,
    /// Support structure.
    Hospital,
    /// Builds workers and fumigators.
    Market,
    /// Builds structures.
    Worker,
    /// Cleans hazards.
    Fumigator,
    /// Spreads hazards to the enemy.
    Infecter,
    /// Fights.
    Soldier,
}

/// What can build units: the base or a unit of some kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Builder {
    /// The privileged home structure.
    Base,
    /// A unit.
    Unit(UnitKind),
}

impl Builder {
    /// Kinds this builder can produce.
    #[must_use]
    pub const fn builds(self) -> &'static [UnitKind] {
        match self {
            Builder::Base => &[UnitKind::Worker, UnitKind::Fumigator],
            Builder::Unit(kind) => kind.builds(),
        }
    }
}

impl UnitKind {
    /// Number of kinds.
    pub const COUNT: usize = 9;

    /// Every kind, in counter-cell order.
    pub const ALL: [UnitKind; Self::COUNT] = [
        UnitKind::Farm,
        UnitKind::Laboratory,
        UnitKind::Barracks,
        UnitKind::Hospital,
        UnitKind::Market,
        UnitKind::Worker,
        UnitKind::Fumigator,
        UnitKind::Infecter,
        UnitKind::Soldier,
    ];

    /// Position in [`UnitKind::ALL`]; the kind's counter-cell offset.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the kind is a stationary structure.
    #[must_use]
    pub const fn is_structure(self) -> bool {
        matches!(
            self,
            UnitKind::Farm
                | UnitKind::Laboratory
                | UnitKind::Barracks
                | UnitKind::Hospital
                | UnitKind::Market
        )
    }

    /// Kinds a unit of this kind can produce.
    #[must_use]
    pub const fn builds(self) -> &'static [UnitKind] {
        match self {
            UnitKind::Worker => &[
                UnitKind::Farm,
                UnitKind::Laboratory,
                UnitKind::Barracks,
                UnitKind::Hospital,
                UnitKind::Market,
            ],
            UnitKind::Barracks => &[UnitKind::Soldier],
            UnitKind::Laboratory => &[UnitKind::Infecter],
            UnitKind::Market => &[UnitKind::Fumigator, UnitKind::Worker],
            _ => &[],
        }
    }

    /// Builders able to produce this kind.
    #[must_use]
    pub const fn producers(self) -> &'static [Builder] {
        match self {
            UnitKind::Worker | UnitKind::Fumigator => {
                &[Builder::Base, Builder::Unit(UnitKind::Market)]
            }
            UnitKind::Soldier => &[Builder::Unit(UnitKind::Barracks)],
            UnitKind::Infecter => &[Builder::Unit(UnitKind::Laboratory)],
            UnitKind::Farm
            | UnitKind::Laboratory
            | UnitKind::Barracks
            | UnitKind::Hospital
            | UnitKind::Market => &[Builder::Unit(UnitKind::Worker)],
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            UnitKind::Farm => "farm",
            UnitKind::Laboratory => "laboratory",
            UnitKind::Barracks => "barracks",
            UnitKind::Hospital => "hospital",
            UnitKind::Market => "market",
            UnitKind::Worker => "worker",
            UnitKind::Fumigator => "fumigator",
            UnitKind::Infecter => "infecter",
            UnitKind::Soldier => "soldier",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UnitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnitKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown unit kind '{s}'"))
    }
}
