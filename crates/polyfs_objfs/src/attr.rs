//! Authorisation rules for staged attribute mutations.

use polyfs_vfs::{AccessFlags, Credential, FsError, PosixAttr, Result, Setattr, check_access};

/// Applies a staged mutation to an inode's attributes, enforcing the
/// per-field ownership rules:
///
/// * mode: owner or privileged;
/// * uid: changing to a different uid needs privilege;
/// * gid: owner holding the target group, or privileged;
/// * size: write permission (the owner is always allowed);
/// * times, change, createverf: write permission unless owner.
pub fn apply_setattr(cred: &Credential, staged: &Setattr, attr: &mut PosixAttr) -> Result<()> {
    let write_or_owner = |attr: &PosixAttr| -> Result<()> {
        if attr.uid == cred.uid() {
            return Ok(());
        }
        check_access(attr.uid, attr.gid, attr.mode, cred, AccessFlags::WRITE)
    };

    if let Some(mode) = staged.mode() {
        if cred.uid() != attr.uid && !cred.privileged() {
            tracing::debug!(cred_uid = cred.uid(), file_uid = attr.uid, "setattr mode denied");
            return Err(FsError::Perm);
        }
        attr.mode = mode;
    }

    if let Some(uid) = staged.uid() {
        if uid != attr.uid && !cred.privileged() {
            tracing::debug!(cred_uid = cred.uid(), uid, "setattr uid denied");
            return Err(FsError::Perm);
        }
        attr.uid = uid;
    }

    if let Some(gid) = staged.gid() {
        if (cred.uid() == attr.uid && cred.has_group(gid)) || cred.privileged() {
            attr.gid = gid;
        } else {
            tracing::debug!(cred_uid = cred.uid(), gid, "setattr gid denied");
            return Err(FsError::Perm);
        }
    }

    if let Some(size) = staged.size() {
        write_or_owner(attr)?;
        attr.size = size;
    }

    if let Some(mtime) = staged.mtime() {
        write_or_owner(attr)?;
        attr.mtime = mtime;
    }

    if let Some(atime) = staged.atime() {
        write_or_owner(attr)?;
        attr.atime = atime;
    }

    if let Some(change) = staged.change() {
        write_or_owner(attr)?;
        // The change attribute only moves forward.
        let change = i64::try_from(change).unwrap_or(i64::MAX);
        if change > attr.ctime {
            attr.ctime = change;
        }
    }

    if let Some(verf) = staged.createverf() {
        write_or_owner(attr)?;
        // The exclusive-create verifier is overlaid on atime.
        attr.atime = i64::from_ne_bytes(verf.to_ne_bytes());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyfs_vfs::FileType;

    fn file_attr(uid: u32, gid: u32, mode: u32) -> PosixAttr {
        let mut attr = PosixAttr::new(FileType::File);
        attr.uid = uid;
        attr.gid = gid;
        attr.mode = mode;
        attr
    }

    #[test]
    fn only_the_owner_sets_mode() {
        let mut attr = file_attr(100, 100, 0o644);
        let other = Credential::user(7, 7);
        let mut staged = Setattr::new();
        staged.set_mode(0o600);
        assert_eq!(
            apply_setattr(&other, &staged, &mut attr),
            Err(FsError::Perm)
        );

        let owner = Credential::user(100, 100);
        apply_setattr(&owner, &staged, &mut attr).expect("owner may chmod");
        assert_eq!(attr.mode, 0o600);
    }

    #[test]
    fn uid_change_requires_privilege() {
        let mut attr = file_attr(100, 100, 0o644);
        let owner = Credential::user(100, 100);
        let mut staged = Setattr::new();
        staged.set_uid(42);
        assert_eq!(
            apply_setattr(&owner, &staged, &mut attr),
            Err(FsError::Perm)
        );

        // Setting the uid to its current value is a no-op anyone may do.
        let mut same = Setattr::new();
        same.set_uid(100);
        apply_setattr(&owner, &same, &mut attr).expect("same uid is fine");

        apply_setattr(&Credential::superuser(), &staged, &mut attr).expect("root may chown");
        assert_eq!(attr.uid, 42);
    }

    #[test]
    fn gid_change_needs_membership() {
        let mut attr = file_attr(100, 100, 0o644);
        let mut staged = Setattr::new();
        staged.set_gid(5);

        let not_member = Credential::user(100, 100);
        assert_eq!(
            apply_setattr(&not_member, &staged, &mut attr),
            Err(FsError::Perm)
        );

        let member = Credential::new(100, 100, vec![5], false);
        apply_setattr(&member, &staged, &mut attr).expect("owner in group may chgrp");
        assert_eq!(attr.gid, 5);
    }

    #[test]
    fn size_needs_write_unless_owner() {
        let mut attr = file_attr(100, 100, 0o600);
        let mut staged = Setattr::new();
        staged.set_size(10);

        let stranger = Credential::user(7, 7);
        assert_eq!(
            apply_setattr(&stranger, &staged, &mut attr),
            Err(FsError::AccessDenied)
        );

        let owner = Credential::user(100, 100);
        apply_setattr(&owner, &staged, &mut attr).expect("owner may truncate");
        assert_eq!(attr.size, 10);

        // A writable file can be truncated by anyone with write access.
        attr.mode = 0o666;
        let mut staged = Setattr::new();
        staged.set_size(0);
        apply_setattr(&stranger, &staged, &mut attr).expect("writable for others");
        assert_eq!(attr.size, 0);
    }

    #[test]
    fn change_is_monotonic() {
        let mut attr = file_attr(100, 100, 0o644);
        attr.ctime = 50;
        let owner = Credential::user(100, 100);

        let mut staged = Setattr::new();
        staged.set_change(40);
        apply_setattr(&owner, &staged, &mut attr).expect("allowed");
        assert_eq!(attr.ctime, 50);

        let mut staged = Setattr::new();
        staged.set_change(60);
        apply_setattr(&owner, &staged, &mut attr).expect("allowed");
        assert_eq!(attr.ctime, 60);
    }
}
