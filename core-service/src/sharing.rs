//! Third-party data sharing partners.
//!
//! Partner names arrive from the host as free text and are folded into a
//! [`SharingMask`] before they reach a backend. Names are matched exactly,
//! including case; anything unrecognized is dropped.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Attribution or ad-mediation partner that can receive analytics identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharingPartner {
    AppsFlyer,
    IronSource,
    Adjust,
    Branch,
    TopOn,
    Tracking,
    TradPlus,
}

impl SharingPartner {
    pub const ALL: [SharingPartner; 7] = [
        SharingPartner::AppsFlyer,
        SharingPartner::IronSource,
        SharingPartner::Adjust,
        SharingPartner::Branch,
        SharingPartner::TopOn,
        SharingPartner::Tracking,
        SharingPartner::TradPlus,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SharingPartner::AppsFlyer => "AppsFlyer",
            SharingPartner::IronSource => "IronSource",
            SharingPartner::Adjust => "Adjust",
            SharingPartner::Branch => "Branch",
            SharingPartner::TopOn => "TopOn",
            SharingPartner::Tracking => "Tracking",
            SharingPartner::TradPlus => "TradPlus",
        }
    }

    /// Bit position owned by this partner.
    pub fn bit(&self) -> u32 {
        match self {
            SharingPartner::AppsFlyer => 0,
            SharingPartner::IronSource => 1,
            SharingPartner::Adjust => 2,
            SharingPartner::Branch => 3,
            SharingPartner::TopOn => 4,
            SharingPartner::Tracking => 5,
            SharingPartner::TradPlus => 6,
        }
    }

    pub fn mask(&self) -> SharingMask {
        SharingMask(1 << self.bit())
    }
}

impl fmt::Display for SharingPartner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a name does not match any partner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sharing partner '{0}'")]
pub struct UnknownPartner(pub String);

impl FromStr for SharingPartner {
    type Err = UnknownPartner;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SharingPartner::ALL
            .into_iter()
            .find(|partner| partner.name() == s)
            .ok_or_else(|| UnknownPartner(s.to_string()))
    }
}

/// Set of enabled partners, bit `i` set when the partner owning bit `i` is
/// enabled. Built per call and handed to the backend as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SharingMask(u32);

impl SharingMask {
    pub const EMPTY: SharingMask = SharingMask(0);

    /// Fold partner names into a mask. Unknown names are skipped; order and
    /// repetition have no effect.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter_map(|name| name.as_ref().parse::<SharingPartner>().ok())
            .collect()
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, partner: SharingPartner) -> bool {
        self.0 & partner.mask().0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn partners(&self) -> impl Iterator<Item = SharingPartner> + '_ {
        SharingPartner::ALL
            .into_iter()
            .filter(move |partner| self.contains(*partner))
    }
}

impl BitOr for SharingMask {
    type Output = SharingMask;

    fn bitor(self, rhs: SharingMask) -> SharingMask {
        SharingMask(self.0 | rhs.0)
    }
}

impl BitOr<SharingPartner> for SharingMask {
    type Output = SharingMask;

    fn bitor(self, rhs: SharingPartner) -> SharingMask {
        self | rhs.mask()
    }
}

impl BitOrAssign<SharingPartner> for SharingMask {
    fn bitor_assign(&mut self, rhs: SharingPartner) {
        *self = *self | rhs;
    }
}

impl FromIterator<SharingPartner> for SharingMask {
    fn from_iter<T: IntoIterator<Item = SharingPartner>>(iter: T) -> Self {
        iter.into_iter()
            .fold(SharingMask::EMPTY, |mask, partner| mask | partner)
    }
}

impl From<SharingMask> for u32 {
    fn from(mask: SharingMask) -> Self {
        mask.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_bits_are_distinct() {
        let combined = SharingPartner::ALL
            .into_iter()
            .fold(0u32, |acc, partner| {
                assert_eq!(acc & partner.mask().bits(), 0, "{partner} reuses a bit");
                acc | partner.mask().bits()
            });
        assert_eq!(combined, 0b111_1111);
    }

    #[test]
    fn test_adjust_and_branch() {
        assert_eq!(SharingMask::from_names(["Adjust", "Branch"]).bits(), 12);
        assert_eq!(
            SharingMask::from_names(["Branch", "Adjust", "Adjust"]).bits(),
            12
        );
    }

    #[test]
    fn test_order_and_duplicates_do_not_matter() {
        let forward = SharingMask::from_names(["AppsFlyer", "TopOn", "TradPlus"]);
        let shuffled = SharingMask::from_names(["TradPlus", "AppsFlyer", "TopOn", "TopOn"]);
        assert_eq!(forward, shuffled);
        assert_eq!(forward.bits(), 1 | 16 | 64);
    }

    #[test]
    fn test_empty_and_unknown() {
        assert_eq!(SharingMask::from_names(Vec::<String>::new()), SharingMask::EMPTY);
        assert!(SharingMask::from_names(["Facebook", ""]).is_empty());
        // Matching is case-sensitive
        assert!(SharingMask::from_names(["adjust", "BRANCH"]).is_empty());
        assert_eq!(
            SharingMask::from_names(["Tracking", "Unknown"]).bits(),
            1 << 5
        );
    }

    #[test]
    fn test_parse_and_display() {
        for partner in SharingPartner::ALL {
            assert_eq!(partner.to_string().parse::<SharingPartner>(), Ok(partner));
        }
        assert_eq!(
            "Appsflyer".parse::<SharingPartner>(),
            Err(UnknownPartner("Appsflyer".to_string()))
        );
    }

    #[test]
    fn test_unknown_partner_is_an_error() {
        let err: Box<dyn std::error::Error> =
            Box::new("Kochava".parse::<SharingPartner>().unwrap_err());
        assert_eq!(err.to_string(), "unknown sharing partner 'Kochava'");
    }

    #[test]
    fn test_partners_iterates_in_bit_order() {
        let mask = SharingPartner::Branch.mask() | SharingPartner::IronSource;
        let partners: Vec<_> = mask.partners().collect();
        assert_eq!(
            partners,
            vec![SharingPartner::IronSource, SharingPartner::Branch]
        );
        assert!(mask.contains(SharingPartner::Branch));
        assert!(!mask.contains(SharingPartner::Adjust));
    }
}
