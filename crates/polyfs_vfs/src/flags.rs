/// Flags for `open`.
pub struct OpenFlags;

impl OpenFlags {
    pub const READ: u32 = 1;
    pub const WRITE: u32 = 2;
    pub const RDWR: u32 = 3;
    pub const CREATE: u32 = 4;
    pub const TRUNCATE: u32 = 8;
    pub const EXCLUSIVE: u32 = 16;
    pub const SHLOCK: u32 = 32;
    pub const EXLOCK: u32 = 64;
}

/// File mode bits.
pub struct ModeFlags;

impl ModeFlags {
    pub const SETUID: u32 = 0o4000;
    pub const SETGID: u32 = 0o2000;
    pub const STICKY: u32 = 0o1000;

    pub const RUSER: u32 = 0o400;
    pub const WUSER: u32 = 0o200;
    pub const XUSER: u32 = 0o100;

    pub const RGROUP: u32 = 0o040;
    pub const WGROUP: u32 = 0o020;
    pub const XGROUP: u32 = 0o010;

    pub const ROTHER: u32 = 0o004;
    pub const WOTHER: u32 = 0o002;
    pub const XOTHER: u32 = 0o001;
}

/// Flags for `access` and [`crate::check_access`].
pub struct AccessFlags;

impl AccessFlags {
    pub const READ: u32 = 1;
    pub const WRITE: u32 = 2;
    pub const EXECUTE: u32 = 4;
    pub const ALL: u32 = 7;
}
