//! The small surface of host-OS primitives this driver consumes.
//!
//! Expressing this as a trait (rather than calling syscalls directly, as
//! the original resource manager does) is what lets the Completion
//! Synchronizer, Command Engine, and Page I/O state machines run against
//! an in-memory mock in tests.

/// Opaque handle to a message port created via [`HostOs::create_message_port`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortId(pub u32);

/// The two AHB bridges that participate in the DMA-visibility flush
/// protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AhbBridge {
    Nand,
    Starlet,
}

/// Host operating system primitives the NAND core needs in order to
/// synchronize with the controller and maintain cache/bus coherency.
pub trait HostOs {
    /// Creates a message queue of the given depth. Returns a port id or
    /// an opaque negative-style failure.
    fn create_message_port(&self, capacity: usize) -> Result<PortId, ()>;

    /// Destroys a message port. Best-effort; failures are not reported.
    fn destroy_message_port(&self, port: PortId);

    /// Binds a hardware IRQ source to a port, delivering `payload` on
    /// each firing.
    fn register_irq(&self, irq_num: u32, port: PortId, payload: u32) -> Result<(), ()>;

    /// Unregisters a previously bound IRQ source.
    fn unregister_irq(&self, irq_num: u32);

    /// Blocks until a message arrives on `port`, returning its payload.
    fn receive_message(&self, port: PortId) -> Result<u32, ()>;

    /// Resolves a virtual address to the physical address the NAND
    /// controller's DMA engine must be programmed with.
    fn virt_to_phys(&self, addr: usize) -> u32;

    /// Invalidates the CPU data cache over `[addr, addr+len)` before a
    /// device-to-CPU DMA transfer.
    fn dcache_invalidate(&self, addr: usize, len: usize);

    /// Flushes the CPU data cache over `[addr, addr+len)` before a
    /// CPU-to-device DMA transfer.
    fn dcache_flush(&self, addr: usize, len: usize);

    /// Issues an AHB bus-bridge flush ordering DMA writes from `bridge`
    /// to be visible to the CPU.
    fn ahb_flush_from(&self, bridge: AhbBridge);

    /// Issues an AHB bus-bridge flush ordering CPU writes to be visible
    /// to `bridge`.
    fn ahb_flush_to(&self, bridge: AhbBridge);
}
