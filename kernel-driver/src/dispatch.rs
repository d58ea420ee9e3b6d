//! dispatch.rs
//! Routes ioctl codes to the three counter operations.

use std::ffi::c_long;
use std::sync::Arc;

use shared::{Command, Count, IoctlCode};

use crate::error::{DriverError, DriverResult};
use crate::events::{DeviceEvent, EventSink, Rejection};
use crate::state::SharedCounter;
use crate::user_ptr::{UserAddr, UserMemory, UserSlice, UserSliceReader, UserSliceWriter};

/// The untyped ioctl argument: an address in the caller's memory.
///
/// It only becomes readable or writable once the dispatcher knows, from the
/// command code, how many bytes it covers and in which direction.
#[derive(Clone, Copy)]
pub struct IoctlArg<'a> {
    memory: &'a dyn UserMemory,
    addr: UserAddr,
}

impl<'a> IoctlArg<'a> {
    pub fn new(memory: &'a dyn UserMemory, addr: UserAddr) -> Self {
        Self { memory, addr }
    }

    fn slice(self, len: usize) -> UserSlice<'a> {
        UserSlice::new(self.memory, self.addr, len)
    }
}

/// Serves commands against one counter.
pub struct Dispatcher {
    counter: Arc<SharedCounter>,
    events: Arc<dyn EventSink>,
}

impl Dispatcher {
    pub fn new(counter: Arc<SharedCounter>, events: Arc<dyn EventSink>) -> Self {
        Self { counter, events }
    }

    /// Decodes `code` and runs the command.
    ///
    /// A code outside the device's namespace is refused before the argument
    /// is looked at. Copy faults leave the counter as it was.
    pub fn dispatch(&self, code: IoctlCode, arg: IoctlArg<'_>) -> DriverResult {
        let command = match Command::decode(code) {
            Ok(command) => command,
            Err(err) => {
                self.events.emit(&DeviceEvent::CommandRejected {
                    code,
                    reason: Rejection::from(&err),
                });
                return Err(err.into());
            }
        };
        self.events.emit(&DeviceEvent::CommandDispatched { command });

        let result = match command {
            Command::Reset => {
                self.counter.reset();
                Ok(())
            }
            Command::GetCount => self.get_count(&mut arg.slice(code.size()).writer()),
            Command::Increment => self.increment(&mut arg.slice(code.size()).reader()),
        };

        if let Err(DriverError::CopyFault { addr, len }) = &result {
            self.events.emit(&DeviceEvent::CopyFaulted { command, addr: *addr, len: *len });
        }
        result
    }

    fn get_count(&self, writer: &mut UserSliceWriter<'_>) -> DriverResult {
        // snapshot under the lock, copy out after releasing it
        let value = self.counter.get();
        writer.write(&value)
    }

    fn increment(&self, reader: &mut UserSliceReader<'_>) -> DriverResult {
        let delta: Count = reader.read()?;
        self.counter.add(delta);
        Ok(())
    }
}

/// What the ioctl syscall returns for `result`: 0, or a negated errno.
pub fn ioctl_status(result: &DriverResult) -> c_long {
    match result {
        Ok(()) => 0,
        Err(err) => -c_long::from(err.errno()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::user_ptr::{Access, LocalUserMemory};
    use shared::constants::{EFAULT, ENOTTY};
    use shared::{MYIOCTL_GET_COUNT, MYIOCTL_INCREMENT, MYIOCTL_RESET};

    fn dispatcher() -> (Dispatcher, Arc<SharedCounter>, Arc<RecordingSink>) {
        let counter = Arc::new(SharedCounter::new());
        let sink = Arc::new(RecordingSink::new());
        (Dispatcher::new(counter.clone(), sink.clone()), counter, sink)
    }

    #[test]
    fn reset_ignores_its_argument() {
        let (d, counter, _) = dispatcher();
        let mem = LocalUserMemory::new();
        counter.add(9);

        d.dispatch(MYIOCTL_RESET, IoctlArg::new(&mem, UserAddr::NULL)).unwrap();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn get_count_writes_one_native_count() {
        let (d, counter, sink) = dispatcher();
        let mem = LocalUserMemory::new();
        let out = mem.map(std::mem::size_of::<Count>(), Access::ReadWrite);
        counter.add(-5);

        d.dispatch(MYIOCTL_GET_COUNT, IoctlArg::new(&mem, out)).unwrap();
        assert_eq!(mem.peek_value::<Count>(out), Some(-5));
        assert_eq!(
            sink.snapshot(),
            vec![DeviceEvent::CommandDispatched { command: Command::GetCount }]
        );
    }

    #[test]
    fn get_count_into_read_only_memory_faults() {
        let (d, counter, sink) = dispatcher();
        let mem = LocalUserMemory::new();
        let out = mem.map_value::<Count>(0, Access::ReadOnly);
        counter.add(3);

        let result = d.dispatch(MYIOCTL_GET_COUNT, IoctlArg::new(&mem, out));
        assert!(matches!(result, Err(DriverError::CopyFault { .. })));
        assert_eq!(ioctl_status(&result), -c_long::from(EFAULT));
        assert_eq!(counter.get(), 3);
        assert_eq!(sink.count(|e| matches!(e, DeviceEvent::CopyFaulted { .. })), 1);
    }

    #[test]
    fn increment_reads_the_delta() {
        let (d, counter, _) = dispatcher();
        let mem = LocalUserMemory::new();
        let delta = mem.map_value::<Count>(40, Access::ReadOnly);

        d.dispatch(MYIOCTL_INCREMENT, IoctlArg::new(&mem, delta)).unwrap();
        d.dispatch(MYIOCTL_INCREMENT, IoctlArg::new(&mem, delta)).unwrap();
        assert_eq!(counter.get(), 80);
    }

    #[test]
    fn rejection_is_enotty_and_recorded() {
        let (d, _, sink) = dispatcher();
        let mem = LocalUserMemory::new();
        let foreign = IoctlCode::from_raw(0x5309);

        let result = d.dispatch(foreign, IoctlArg::new(&mem, UserAddr::NULL));
        assert_eq!(ioctl_status(&result), -c_long::from(ENOTTY));
        assert_eq!(
            sink.snapshot(),
            vec![DeviceEvent::CommandRejected {
                code: foreign,
                reason: Rejection::InvalidNamespace
            }]
        );
    }

    #[test]
    fn success_status_is_zero() {
        assert_eq!(ioctl_status(&Ok(())), 0);
    }
}
