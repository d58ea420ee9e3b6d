/// Name the device registers under.
pub const DEVICE_NAME: &str = "myioctl";
/// Default location of the persisted counter.
pub const DEFAULT_STORE_PATH: &str = "/etc/my_variable_file";
/// Private ioctl namespace tag of the device.
pub const MYIOCTL_MAGIC: u8 = b'k';

/* command numbers within the 'k' namespace */
pub const NR_RESET: u8 = 0;
pub const NR_GET_COUNT: u8 = 1;
pub const NR_INCREMENT: u8 = 2;

/* errno values reported at the ioctl boundary (asm-generic/errno-base.h) */
pub const EIO: i32 = 5;
pub const EFAULT: i32 = 14;
pub const EBUSY: i32 = 16;
pub const ENOTTY: i32 = 25;
