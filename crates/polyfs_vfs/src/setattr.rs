/// A staged attribute mutation: only the fields that were explicitly set
/// are applied, each under its own authorisation rule (see the
/// filesystem implementations).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Setattr {
    mode: Option<u32>,
    uid: Option<u32>,
    gid: Option<u32>,
    size: Option<u64>,
    atime: Option<i64>,
    mtime: Option<i64>,
    change: Option<u64>,
    createverf: Option<u64>,
}

impl Setattr {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for the common mode-only case.
    #[must_use]
    pub fn with_mode(mode: u32) -> Self {
        let mut attr = Self::default();
        attr.set_mode(mode);
        attr
    }

    pub fn set_mode(&mut self, mode: u32) -> &mut Self {
        self.mode = Some(mode);
        self
    }

    pub fn set_uid(&mut self, uid: u32) -> &mut Self {
        self.uid = Some(uid);
        self
    }

    pub fn set_gid(&mut self, gid: u32) -> &mut Self {
        self.gid = Some(gid);
        self
    }

    pub fn set_size(&mut self, size: u64) -> &mut Self {
        self.size = Some(size);
        self
    }

    pub fn set_atime(&mut self, nanos: i64) -> &mut Self {
        self.atime = Some(nanos);
        self
    }

    pub fn set_mtime(&mut self, nanos: i64) -> &mut Self {
        self.mtime = Some(nanos);
        self
    }

    pub fn set_change(&mut self, change: u64) -> &mut Self {
        self.change = Some(change);
        self
    }

    pub fn set_createverf(&mut self, verf: u64) -> &mut Self {
        self.createverf = Some(verf);
        self
    }

    #[must_use]
    pub const fn mode(&self) -> Option<u32> {
        self.mode
    }

    #[must_use]
    pub const fn uid(&self) -> Option<u32> {
        self.uid
    }

    #[must_use]
    pub const fn gid(&self) -> Option<u32> {
        self.gid
    }

    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        self.size
    }

    #[must_use]
    pub const fn atime(&self) -> Option<i64> {
        self.atime
    }

    #[must_use]
    pub const fn mtime(&self) -> Option<i64> {
        self.mtime
    }

    #[must_use]
    pub const fn change(&self) -> Option<u64> {
        self.change
    }

    #[must_use]
    pub const fn createverf(&self) -> Option<u64> {
        self.createverf
    }

    /// True if no field was staged.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.uid.is_none()
            && self.gid.is_none()
            && self.size.is_none()
            && self.atime.is_none()
            && self.mtime.is_none()
            && self.change.is_none()
            && self.createverf.is_none()
    }
}
