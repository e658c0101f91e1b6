//! User and group name resolution through the passwd and group databases

use nix::unistd::{Gid, Group, Uid, User};
use std::io;

/// Name of the user with `uid`, `None` if there is no such user.
pub fn user_name(uid: u32) -> io::Result<Option<String>> {
    let user = User::from_uid(Uid::from_raw(uid))?;
    Ok(user.map(|u| u.name))
}

/// Name of the group with `gid`, `None` if there is no such group.
pub fn group_name(gid: u32) -> io::Result<Option<String>> {
    let group = Group::from_gid(Gid::from_raw(gid))?;
    Ok(group.map(|g| g.name))
}

/// Uid of the user called `name`, `None` if there is no such user.
pub fn user_id(name: &str) -> io::Result<Option<u32>> {
    let user = User::from_name(name)?;
    Ok(user.map(|u| u.uid.as_raw()))
}

/// Gid of the group called `name`, `None` if there is no such group.
pub fn group_id(name: &str) -> io::Result<Option<u32>> {
    let group = Group::from_name(name)?;
    Ok(group.map(|g| g.gid.as_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_user() {
        assert_eq!(user_name(0).unwrap().as_deref(), Some("root"));
        assert_eq!(user_id("root").unwrap(), Some(0));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_root_group() {
        assert_eq!(group_name(0).unwrap().as_deref(), Some("root"));
        assert_eq!(group_id("root").unwrap(), Some(0));
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(user_id("converge-no-such-user").unwrap(), None);
        assert_eq!(group_id("converge-no-such-group").unwrap(), None);
    }

    #[test]
    fn test_name_with_nul_matches_nobody() {
        assert!(!matches!(user_id("ro\0ot"), Ok(Some(_))));
    }
}
