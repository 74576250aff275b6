//! Deterministic identifiers for fixture identities.
//!
//! Provisioning fixture accounts (seed data, local setups, tests) must produce
//! the same ids for the same suffix so runs are repeatable. A suffix of
//! exactly four lowercase hex digits slots into a readable UUID template,
//! e.g. suffix `0001` gives person `aaaa0000-0001-0000-0001-cccccccccccc`.
//! Any other suffix (`1`, `000A`, `alice`) is hashed into a v5 UUID, so two
//! distinct suffixes never share ids. Production identities never go through here; they
//! use random v4 ids.

use uuid::Uuid;

/// Namespace for v5 fixture ids.
const FIXTURE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2d0e_8a4b_4c53_9f0e_1d2c_3b4a_5968);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureIds {
    pub person: Uuid,
    pub account: Uuid,
    pub token: Uuid,
}

impl FixtureIds {
    pub fn for_suffix(suffix: &str) -> Self {
        match hex_group(suffix) {
            Some(group) => Self {
                person: templated(0x0001, group, 0xcccc_cccc_cccc),
                account: templated(0x0002, group, 0xaaaa_aaaa_aaaa),
                token: templated(0x0003, group, 0xbbbb_bbbb_bbbb),
            },
            None => Self {
                person: Uuid::new_v5(&FIXTURE_NAMESPACE, format!("person:{}", suffix).as_bytes()),
                account: Uuid::new_v5(&FIXTURE_NAMESPACE, format!("account:{}", suffix).as_bytes()),
                token: Uuid::new_v5(&FIXTURE_NAMESPACE, format!("token:{}", suffix).as_bytes()),
            },
        }
    }
}

/// Template group for suffixes that render back to themselves.
fn hex_group(suffix: &str) -> Option<u16> {
    let canonical = suffix.len() == 4
        && suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if !canonical {
        return None;
    }
    u16::from_str_radix(suffix, 16).ok()
}

/// `aaaa0000-<kind>-0000-<group>-<node>`
fn templated(kind: u16, group: u16, node: u64) -> Uuid {
    let value = (0xaaaa_0000u128 << 96)
        | ((kind as u128) << 80)
        | ((group as u128) << 48)
        | (node as u128 & 0xffff_ffff_ffff);
    Uuid::from_u128(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_suffix_follows_readable_template() {
        let ids = FixtureIds::for_suffix("0001");
        assert_eq!(
            ids.person.to_string(),
            "aaaa0000-0001-0000-0001-cccccccccccc"
        );
        assert_eq!(
            ids.account.to_string(),
            "aaaa0000-0002-0000-0001-aaaaaaaaaaaa"
        );
        assert_eq!(
            ids.token.to_string(),
            "aaaa0000-0003-0000-0001-bbbbbbbbbbbb"
        );
    }

    #[test]
    fn default_suffix_ids() {
        let ids = FixtureIds::for_suffix("0000");
        assert_eq!(
            ids.person.to_string(),
            "aaaa0000-0001-0000-0000-cccccccccccc"
        );
    }

    #[test]
    fn non_canonical_hex_suffixes_get_their_own_ids() {
        let padded = FixtureIds::for_suffix("0001");
        let short = FixtureIds::for_suffix("1");
        assert_ne!(short.person, padded.person);
        assert_ne!(short.account, padded.account);
        assert_ne!(short.token, padded.token);
        assert_eq!(short.person.get_version_num(), 5);

        let lower = FixtureIds::for_suffix("00ab");
        let upper = FixtureIds::for_suffix("00AB");
        assert_eq!(lower.person.to_string(), "aaaa0000-0001-0000-00ab-cccccccccccc");
        assert_ne!(lower.person, upper.person);
        assert_ne!(FixtureIds::for_suffix("a").person, FixtureIds::for_suffix("A").person);
    }

    #[test]
    fn other_suffixes_are_deterministic_v5() {
        let a = FixtureIds::for_suffix("alice");
        let b = FixtureIds::for_suffix("alice");
        let c = FixtureIds::for_suffix("bob");

        assert_eq!(a, b);
        assert_ne!(a.person, c.person);
        assert_eq!(a.person.get_version_num(), 5);
        assert_ne!(a.person, a.account);
        assert_ne!(a.account, a.token);
    }

    #[test]
    fn distinct_hex_suffixes_never_collide() {
        let a = FixtureIds::for_suffix("0001");
        let b = FixtureIds::for_suffix("0002");
        assert_ne!(a.person, b.person);
        assert_ne!(a.account, b.account);
        assert_ne!(a.token, b.token);
    }
}
