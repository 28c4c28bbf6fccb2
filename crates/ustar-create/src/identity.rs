//! Owner and group names for header `uname`/`gname` fields.

use log::info;
use nix::unistd::{Gid, Group, Uid, User};

/// Looks up account names by numeric id.
pub trait IdentityResolver {
    /// The login name for `uid`, if there is one.
    fn user_name(&self, uid: u64) -> Option<String>;

    /// The group name for `gid`, if there is one.
    fn group_name(&self, gid: u64) -> Option<String>;
}

impl<T: IdentityResolver + ?Sized> IdentityResolver for &T {
    fn user_name(&self, uid: u64) -> Option<String> {
        (**self).user_name(uid)
    }

    fn group_name(&self, gid: u64) -> Option<String> {
        (**self).group_name(gid)
    }
}

/// The host account databases, via `getpwuid_r` and `getgrgid_r`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemIdentity;

impl IdentityResolver for SystemIdentity {
    fn user_name(&self, uid: u64) -> Option<String> {
        let uid = u32::try_from(uid).ok()?;
        User::from_uid(Uid::from_raw(uid)).ok().flatten().map(|u| u.name)
    }

    fn group_name(&self, gid: u64) -> Option<String> {
        let gid = u32::try_from(gid).ok()?;
        Group::from_gid(Gid::from_raw(gid))
            .ok()
            .flatten()
            .map(|g| g.name)
    }
}

/// Remembers the most recent user and group lookup.
///
/// Archive members are usually owned by the same account, so a single slot
/// per kind is enough to avoid nearly all lookups. Ids without a name
/// resolve to the empty string, and that answer is cached too.
#[derive(Debug)]
pub struct IdentityCache<R> {
    resolver: R,
    user: Option<(u64, Box<str>)>,
    group: Option<(u64, Box<str>)>,
}

impl<R: IdentityResolver> IdentityCache<R> {
    /// Wrap `resolver` with an empty cache.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            user: None,
            group: None,
        }
    }

    /// The user name for `uid`, or `""` if it has none.
    pub fn user_name(&mut self, uid: u64) -> &str {
        if !matches!(self.user, Some((cached, _)) if cached == uid) {
            let name = self.resolver.user_name(uid).unwrap_or_else(|| {
                info!("failed to get name for uid {uid}");
                String::new()
            });
            self.user = Some((uid, name.into_boxed_str()));
        }
        self.user.as_ref().map_or("", |(_, name)| name)
    }

    /// The group name for `gid`, or `""` if it has none.
    pub fn group_name(&mut self, gid: u64) -> &str {
        if !matches!(self.group, Some((cached, _)) if cached == gid) {
            let name = self.resolver.group_name(gid).unwrap_or_else(|| {
                info!("failed to get name for gid {gid}");
                String::new()
            });
            self.group = Some((gid, name.into_boxed_str()));
        }
        self.group.as_ref().map_or("", |(_, name)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TableIdentity;

    #[test]
    fn test_cache_hits() {
        let table = TableIdentity::new()
            .user(1000, "alice")
            .group(100, "users");
        let mut cache = IdentityCache::new(&table);

        assert_eq!(cache.user_name(1000), "alice");
        assert_eq!(cache.user_name(1000), "alice");
        assert_eq!(cache.group_name(100), "users");
        assert_eq!(cache.group_name(100), "users");
        assert_eq!(table.user_lookups(), 1);
        assert_eq!(table.group_lookups(), 1);

        // a different id replaces the slot
        assert_eq!(cache.user_name(0), "");
        assert_eq!(cache.user_name(1000), "alice");
        assert_eq!(table.user_lookups(), 3);
    }

    #[test]
    fn test_missing_names_are_cached() {
        let table = TableIdentity::new();
        let mut cache = IdentityCache::new(&table);

        assert_eq!(cache.user_name(4242), "");
        assert_eq!(cache.user_name(4242), "");
        assert_eq!(cache.group_name(4242), "");
        assert_eq!(table.user_lookups(), 1);
        assert_eq!(table.group_lookups(), 1);
    }

    #[test]
    fn test_system_root() {
        // uid 0 is named on every system the tests run on
        assert!(SystemIdentity.user_name(0).is_some_and(|n| !n.is_empty()));
        assert_eq!(SystemIdentity.user_name(u64::MAX), None);
    }
}
