//! In-memory mocks for [`crate::registers::RegisterGateway`] and
//! [`crate::hal::HostOs`], shared by the `#[cfg(test)] mod tests` block
//! in every other module in this crate.
//!
//! Both mocks record every call into a trace so tests can assert on
//! ordering and exact ranges (properties P1-P3), not just final state.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::vec::Vec;

use crate::hal::{AhbBridge, HostOs, PortId};
use crate::registers::RegisterGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    WriteCommand(u32),
    WriteConfig(u32),
    WriteVendor1(u32),
    WriteVendor2(u32),
    WriteAddress0(Option<u32>),
    WriteAddress1(Option<u32>),
    WriteDataPtr(Option<u32>),
    WriteEccPtr(Option<u32>),
    Invalidate(usize, usize),
    Flush(usize, usize),
    AhbFrom(AhbBridge),
    AhbTo(AhbBridge),
}

/// A register bank whose state is plain fields, with every write
/// recorded to a shared trace.
pub struct MockRegisters {
    command: Cell<u32>,
    config: Cell<u32>,
    vendor1: Cell<u32>,
    vendor2: Cell<u32>,
    trace: RefCell<Vec<TraceEvent>>,
}

impl MockRegisters {
    pub fn new() -> Self {
        Self {
            command: Cell::new(0),
            config: Cell::new(0),
            vendor1: Cell::new(0),
            vendor2: Cell::new(0),
            trace: RefCell::new(Vec::new()),
        }
    }

    pub fn trace(&self) -> Vec<TraceEvent> {
        self.trace.borrow().clone()
    }

    /// Directly sets the command register, bypassing the trace, to set
    /// up a scenario (e.g. clearing the execute bit before a poll).
    pub fn poke_command(&self, value: u32) {
        self.command.set(value);
    }
}

impl RegisterGateway for MockRegisters {
    fn read_command(&self) -> u32 {
        self.command.get()
    }

    fn write_command(&self, value: u32) {
        self.trace.borrow_mut().push(TraceEvent::WriteCommand(value));
        // Model the controller completing the command synchronously:
        // clear `execute` so the poll path in `sync::wait_for_completion`
        // terminates. `has_error` is a status bit this mock never derives
        // from `value` (the driver never sets it itself), so whatever a
        // test already poked onto the register survives the write.
        const EXECUTE: u32 = 1 << 0;
        const HAS_ERROR: u32 = 1 << 2;
        let has_error = self.command.get() & HAS_ERROR;
        self.command.set((value & !EXECUTE) | has_error);
    }

    fn read_config(&self) -> u32 {
        self.config.get()
    }

    fn write_config(&self, value: u32) {
        self.config.set(value);
        self.trace.borrow_mut().push(TraceEvent::WriteConfig(value));
    }

    fn read_vendor1(&self) -> u32 {
        self.vendor1.get()
    }

    fn write_vendor1(&self, value: u32) {
        self.vendor1.set(value);
        self.trace.borrow_mut().push(TraceEvent::WriteVendor1(value));
    }

    fn write_vendor2(&self, value: u32) {
        self.vendor2.set(value);
        self.trace.borrow_mut().push(TraceEvent::WriteVendor2(value));
    }

    fn write_address0(&self, value: Option<u32>) {
        self.trace.borrow_mut().push(TraceEvent::WriteAddress0(value));
    }

    fn write_address1(&self, value: Option<u32>) {
        self.trace.borrow_mut().push(TraceEvent::WriteAddress1(value));
    }

    fn write_data_ptr(&self, value: Option<u32>) {
        self.trace.borrow_mut().push(TraceEvent::WriteDataPtr(value));
    }

    fn write_ecc_ptr(&self, value: Option<u32>) {
        self.trace.borrow_mut().push(TraceEvent::WriteEccPtr(value));
    }
}

/// A host OS mock: message ports are in-memory queues, IRQ delivery is
/// driven explicitly by the test via [`MockOs::deliver_irq`], and every
/// cache/bus maintenance call is recorded to the same kind of trace as
/// [`MockRegisters`].
pub struct MockOs {
    next_port: Cell<u32>,
    queues: RefCell<std::collections::HashMap<u32, VecDeque<u32>>>,
    fail_receive: Cell<bool>,
    trace: RefCell<Vec<TraceEvent>>,
    phys_offset: u32,
}

impl MockOs {
    pub fn new() -> Self {
        Self {
            next_port: Cell::new(1),
            queues: RefCell::new(std::collections::HashMap::new()),
            fail_receive: Cell::new(false),
            trace: RefCell::new(Vec::new()),
            phys_offset: 0x1000_0000,
        }
    }

    pub fn trace(&self) -> Vec<TraceEvent> {
        self.trace.borrow().clone()
    }

    /// Queues `payload` for the next [`HostOs::receive_message`] call on
    /// `port`.
    pub fn deliver_irq(&self, port: PortId, payload: u32) {
        self.queues.borrow_mut().entry(port.0).or_default().push_back(payload);
    }

    /// Makes the next `receive_message` call fail, modeling a queue
    /// teardown or a host-OS error.
    pub fn fail_next_receive(&self) {
        self.fail_receive.set(true);
    }
}

impl HostOs for MockOs {
    fn create_message_port(&self, _capacity: usize) -> Result<PortId, ()> {
        let id = self.next_port.get();
        self.next_port.set(id + 1);
        self.queues.borrow_mut().insert(id, VecDeque::new());
        Ok(PortId(id))
    }

    fn destroy_message_port(&self, port: PortId) {
        self.queues.borrow_mut().remove(&port.0);
    }

    fn register_irq(&self, _irq_num: u32, _port: PortId, _payload: u32) -> Result<(), ()> {
        Ok(())
    }

    fn unregister_irq(&self, _irq_num: u32) {}

    fn receive_message(&self, port: PortId) -> Result<u32, ()> {
        if self.fail_receive.replace(false) {
            return Err(());
        }
        self.queues
            .borrow_mut()
            .get_mut(&port.0)
            .and_then(|q| q.pop_front())
            .ok_or(())
    }

    fn virt_to_phys(&self, addr: usize) -> u32 {
        self.phys_offset.wrapping_add(addr as u32)
    }

    fn dcache_invalidate(&self, addr: usize, len: usize) {
        self.trace.borrow_mut().push(TraceEvent::Invalidate(addr, len));
    }

    fn dcache_flush(&self, addr: usize, len: usize) {
        self.trace.borrow_mut().push(TraceEvent::Flush(addr, len));
    }

    fn ahb_flush_from(&self, bridge: AhbBridge) {
        self.trace.borrow_mut().push(TraceEvent::AhbFrom(bridge));
    }

    fn ahb_flush_to(&self, bridge: AhbBridge) {
        self.trace.borrow_mut().push(TraceEvent::AhbTo(bridge));
    }
}
