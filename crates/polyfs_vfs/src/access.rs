use crate::{AccessFlags, Credential, FsError, ModeFlags, Result};

/// POSIX permission check: the owner triple applies when the credential
/// uid matches, otherwise the group triple when the credential holds the
/// file's group, otherwise the other triple. A privileged credential
/// bypasses the check entirely.
pub fn check_access(uid: u32, gid: u32, mode: u32, cred: &Credential, accmode: u32) -> Result<()> {
    debug_assert_eq!(accmode & AccessFlags::ALL, accmode);

    let mut granted = 0;
    if uid == cred.uid() {
        if mode & ModeFlags::RUSER != 0 {
            granted |= AccessFlags::READ;
        }
        if mode & ModeFlags::WUSER != 0 {
            granted |= AccessFlags::WRITE;
        }
        if mode & ModeFlags::XUSER != 0 {
            granted |= AccessFlags::EXECUTE;
        }
    } else if cred.has_group(gid) {
        if mode & ModeFlags::RGROUP != 0 {
            granted |= AccessFlags::READ;
        }
        if mode & ModeFlags::WGROUP != 0 {
            granted |= AccessFlags::WRITE;
        }
        if mode & ModeFlags::XGROUP != 0 {
            granted |= AccessFlags::EXECUTE;
        }
    } else {
        if mode & ModeFlags::ROTHER != 0 {
            granted |= AccessFlags::READ;
        }
        if mode & ModeFlags::WOTHER != 0 {
            granted |= AccessFlags::WRITE;
        }
        if mode & ModeFlags::XOTHER != 0 {
            granted |= AccessFlags::EXECUTE;
        }
    }

    if accmode & granted == accmode {
        return Ok(());
    }
    if cred.privileged() {
        return Ok(());
    }
    tracing::trace!(uid, gid, mode, accmode, granted, "access denied");
    Err(FsError::AccessDenied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_triple() {
        let cred = Credential::user(100, 100);
        assert!(check_access(100, 100, 0o700, &cred, AccessFlags::ALL).is_ok());
        assert!(check_access(100, 100, 0o600, &cred, AccessFlags::EXECUTE).is_err());
        // Owner triple wins even when the group triple would grant more.
        assert!(check_access(100, 100, 0o070, &cred, AccessFlags::READ).is_err());
    }

    #[test]
    fn group_triple() {
        let cred = Credential::new(100, 100, vec![5], false);
        assert!(check_access(0, 100, 0o070, &cred, AccessFlags::ALL).is_ok());
        assert!(check_access(0, 5, 0o050, &cred, AccessFlags::READ | AccessFlags::EXECUTE).is_ok());
        assert!(check_access(0, 5, 0o050, &cred, AccessFlags::WRITE).is_err());
    }

    #[test]
    fn other_triple() {
        let cred = Credential::user(100, 100);
        assert!(check_access(0, 0, 0o007, &cred, AccessFlags::ALL).is_ok());
        assert!(check_access(0, 0, 0o770, &cred, AccessFlags::READ).is_err());
    }

    #[test]
    fn privileged_bypass() {
        let cred = Credential::superuser();
        assert!(check_access(100, 100, 0, &cred, AccessFlags::ALL).is_ok());
    }
}
