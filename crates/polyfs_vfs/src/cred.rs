/// The identity a filesystem operation runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    uid: u32,
    gid: u32,
    groups: Vec<u32>,
    privileged: bool,
}

impl Credential {
    #[must_use]
    pub const fn new(uid: u32, gid: u32, groups: Vec<u32>, privileged: bool) -> Self {
        Self {
            uid,
            gid,
            groups,
            privileged,
        }
    }

    /// The superuser credential: uid 0, gid 0, privileged.
    #[must_use]
    pub const fn superuser() -> Self {
        Self::new(0, 0, Vec::new(), true)
    }

    /// An ordinary user credential with no auxiliary groups.
    #[must_use]
    pub const fn user(uid: u32, gid: u32) -> Self {
        Self::new(uid, gid, Vec::new(), false)
    }

    #[must_use]
    pub const fn uid(&self) -> u32 {
        self.uid
    }

    #[must_use]
    pub const fn gid(&self) -> u32 {
        self.gid
    }

    #[must_use]
    pub fn groups(&self) -> &[u32] {
        &self.groups
    }

    /// True if `gid` is the credential's primary or any auxiliary group.
    #[must_use]
    pub fn has_group(&self, gid: u32) -> bool {
        self.gid == gid || self.groups.contains(&gid)
    }

    #[must_use]
    pub const fn privileged(&self) -> bool {
        self.privileged
    }
}
