//! The command table must stay byte-compatible with the C `_IO`/`_IOR`/`_IOW`
//! macros, since user space builds the same numbers independently.

use std::mem::size_of;

use shared::constants::ENOTTY;
use shared::{
    Command, CommandError, Count, Direction, IoctlCode, MYIOCTL_GET_COUNT, MYIOCTL_INCREMENT,
    MYIOCTL_MAGIC, MYIOCTL_RESET,
};

#[test]
fn reset_matches_c_io_macro() {
    // _IO('k', 0)
    assert_eq!(MYIOCTL_RESET.raw(), 0x0000_6b00);
    assert_eq!(MYIOCTL_RESET.dir(), Direction::None);
    assert_eq!(MYIOCTL_RESET.size(), 0);
}

#[test]
fn get_count_and_increment_carry_one_long() {
    let size = size_of::<Count>() as u32;
    // _IOR('k', 1, long) and _IOW('k', 2, long)
    assert_eq!(MYIOCTL_GET_COUNT.raw(), (2 << 30) | (size << 16) | 0x6b01);
    assert_eq!(MYIOCTL_INCREMENT.raw(), (1 << 30) | (size << 16) | 0x6b02);
    assert_eq!(MYIOCTL_GET_COUNT.dir(), Direction::Read);
    assert_eq!(MYIOCTL_INCREMENT.dir(), Direction::Write);
}

#[cfg(target_pointer_width = "64")]
#[cfg(not(windows))]
#[test]
fn lp64_codes_are_the_well_known_values() {
    assert_eq!(MYIOCTL_GET_COUNT.raw(), 0x8008_6b01);
    assert_eq!(MYIOCTL_INCREMENT.raw(), 0x4008_6b02);
}

#[test]
fn every_command_decodes_from_its_own_code() {
    for cmd in Command::ALL {
        assert_eq!(Command::decode(cmd.code()), Ok(cmd), "{cmd}");
    }
}

#[test]
fn foreign_magic_is_an_invalid_namespace() {
    // CDROMEJECT (0x5309) lives in the 'S' namespace.
    let eject = IoctlCode::from_raw(0x5309);
    assert_eq!(
        Command::decode(eject),
        Err(CommandError::InvalidNamespace { code: eject })
    );

    // Same nr/dir/size as GET_COUNT but another tag.
    let lookalike = IoctlCode::ior(b'j', 1, size_of::<Count>());
    assert!(matches!(
        Command::decode(lookalike),
        Err(CommandError::InvalidNamespace { .. })
    ));
}

#[test]
fn unassigned_numbers_in_our_namespace_are_unknown() {
    let nr3 = IoctlCode::io(MYIOCTL_MAGIC, 3);
    assert_eq!(
        Command::decode(nr3),
        Err(CommandError::UnknownCommand { code: nr3 })
    );
}

#[test]
fn int_sized_legacy_codes_are_not_accepted() {
    // _IOR('k', 1, int) as older builds of the C driver defined it.
    let legacy = IoctlCode::ior(MYIOCTL_MAGIC, 1, 4);
    if size_of::<Count>() != 4 {
        assert!(matches!(
            Command::decode(legacy),
            Err(CommandError::UnknownCommand { .. })
        ));
    }
}

#[test]
fn rejections_map_to_enotty() {
    let err = Command::decode(IoctlCode::from_raw(0)).unwrap_err();
    assert_eq!(err.errno(), ENOTTY);
    assert_eq!(err.code().raw(), 0);
    assert!(err.to_string().contains("namespace"), "{err}");
}
