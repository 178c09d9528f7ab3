//! One module per command family, mirroring the registry.

mod cat;
mod cd;
mod chmod;
mod cp;
mod df;
mod ln;
mod ls;
mod misc;
mod mkdir;
mod mv;
mod rm;
mod stat;

pub use cat::cat;
pub use cd::{cd, pwd};
pub use chmod::{chgrp, chmod, chown};
pub use cp::cp;
pub use df::df;
pub use ln::ln;
pub use ls::{lh, ls};
pub use misc::{help, quit};
pub use mkdir::{mkdir, mkfifo};
pub use mv::mv;
pub use rm::{rm, rmdir};
pub use stat::{fsid, stat};
