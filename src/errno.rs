//! Maps driver-level [`crate::NandError`] codes into the filesystem's
//! errno family for callers that cross the IPC boundary.

/// The filesystem-visible errno space. Only the driver-relevant subset
/// is ever produced by [`translate_errno`]; the rest belong to the
/// filesystem layer (path resolution, fd exhaustion, directory depth)
/// and never originate in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrno {
    Einval,
    Eaccess,
    Ecorrupt,
    Eexist,
    Enoent,
    Enfile,
    Efbig,
    Efdexhausted,
    Enamelen,
    Efdopen,
    Eunkn,
    Eagain,
    Eio,
    Enotempty,
    Edirdepth,
    Notimpl,
    Ebusy,
}

impl FsErrno {
    pub const fn code(self) -> i32 {
        match self {
            FsErrno::Einval => -101,
            FsErrno::Eaccess => -102,
            FsErrno::Ecorrupt => -103,
            FsErrno::Eexist => -105,
            FsErrno::Enoent => -106,
            FsErrno::Enfile => -107,
            FsErrno::Efbig => -108,
            FsErrno::Efdexhausted => -109,
            FsErrno::Enamelen => -110,
            FsErrno::Efdopen => -111,
            FsErrno::Eunkn => -112,
            FsErrno::Eagain => -113,
            FsErrno::Eio => -114,
            FsErrno::Enotempty => -115,
            FsErrno::Edirdepth => -116,
            FsErrno::Notimpl => -117,
            FsErrno::Ebusy => -118,
        }
    }
}

/// Translates a driver-level return code (§7) into the filesystem's
/// errno family. `0` maps to `Ok(())`; any unrecognized non-zero code
/// defaults to `Eunkn` rather than panicking, since this function is
/// reachable from code paths outside this crate's control.
pub fn translate_errno(code: i32) -> Result<(), FsErrno> {
    match code {
        0 => Ok(()),
        -1 => Err(FsErrno::Ecorrupt),
        -4 => Err(FsErrno::Einval),
        -9 => Err(FsErrno::Eio),
        -10 => Err(FsErrno::Ebusy),
        -12 => Err(FsErrno::Eunkn),
        -13 => Err(FsErrno::Eagain),
        _ => Err(FsErrno::Eunkn),
    }
}

/// Translates a [`crate::NandError`] directly, without going through
/// its raw numeric code.
pub fn translate_nand_error(error: crate::NandError) -> FsErrno {
    match error {
        crate::NandError::CommandFailed => FsErrno::Ecorrupt,
        crate::NandError::InvalidArgument => FsErrno::Einval,
        crate::NandError::HardwareSync => FsErrno::Eio,
        crate::NandError::NotReady => FsErrno::Ebusy,
        crate::NandError::Uncorrectable => FsErrno::Eunkn,
        crate::NandError::SoftError => FsErrno::Eagain,
    }
}
