/// Logs one line under the `myioctl` target, tagged with a component.
/// Usage:
/// ```rust
/// # use myioctl_driver::myioctl_log;
/// # use log::Level;
/// myioctl_log!(Level::Info, "chrdev", "loaded, major {}", 240);
/// myioctl_log!(Level::Error, "dispatch", "unknown ioctl");
/// ```
/// Logs like:
/// [chrdev] loaded, major 240
///
/// Timestamp, pid and thread id are added by whatever logger the host installs.
#[macro_export]
macro_rules! myioctl_log {
    ($level:expr, $component:expr, $fmt:expr $(, $($arg:tt)+)?) => {
        $crate::__log::log!(
            target: "myioctl",
            $level,
            concat!("[", $component, "] ", $fmt)
            $(, $($arg)+)?
        )
    };
}


#[cfg(test)]
mod tests {
    use super::test_logger::{capture, LOGGER};
    use log::Level;

    #[test]
    fn myioctl_log_emits_expected_text() {
        let _guard = capture();

        crate::myioctl_log!(Level::Debug, "store", "Answer={}!", 42);
        crate::myioctl_log!(Level::Warn, "chrdev", "no arguments");

        let output = LOGGER.take();
        assert!(output.contains("DEBUG|myioctl|[store] Answer=42!"), "{output}");
        assert!(output.contains("WARN|myioctl|[chrdev] no arguments"), "{output}");
    }
}
