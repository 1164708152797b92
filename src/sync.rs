//! Blocks a caller until the controller finishes the command it just
//! submitted, via exactly one of three distinct paths: IRQ receive,
//! busy-wait poll, or the synthetic recovery reset. These must stay
//! distinct — the recovery path must never block on IRQ receive, even
//! though it runs as a consequence of an IRQ-driven command failing.

use crate::command::CommandFlags;
use crate::hal::{HostOs, PortId};
use crate::registers::{RegisterGateway, COMMAND};
use crate::NandError;
use tock_registers::interfaces::Readable;
use tock_registers::LocalRegisterCopy;

/// Blocks until the in-flight command completes, then checks the
/// `has_error` status bit.
///
/// - `use_irq = true`: blocks on `os.receive_message(irq_port)`. A
///   payload other than `1`, or a receive failure, is `HardwareSync`.
/// - `use_irq = false`: polls the command register's execute bit.
///
/// On any non-zero outcome, runs [`recover`] before returning the error.
pub fn wait_for_completion<O: HostOs, G: RegisterGateway>(
    os: &O,
    regs: &G,
    irq_port: PortId,
    use_irq: bool,
) -> Result<(), NandError> {
    if use_irq {
        match os.receive_message(irq_port) {
            Ok(1) => {}
            _ => {
                recover(regs);
                return Err(NandError::HardwareSync);
            }
        }
    } else {
        while command_word(regs).read(COMMAND::EXECUTE) != 0 {}
    }

    if command_word(regs).read(COMMAND::HAS_ERROR) != 0 {
        recover(regs);
        return Err(NandError::CommandFailed);
    }
    Ok(())
}

/// The error-recovery sequence: poll execute to zero, then issue a
/// synthetic `{execute=1, wait=1, opcode=reset}` command directly
/// through the gateway. Never waits on IRQ, regardless of how the
/// failing command was issued.
pub fn recover<G: RegisterGateway>(regs: &G) {
    while command_word(regs).read(COMMAND::EXECUTE) != 0 {}
    let reset = crate::command::compose_command_word(
        DEFAULT_RESET_OPCODE,
        0,
        CommandFlags::WAIT,
        0,
    );
    regs.write_command(reset.get());
}

/// The default reset opcode shared by every chip profile in the catalog.
const DEFAULT_RESET_OPCODE: u8 = 0xFF;

fn command_word<G: RegisterGateway>(regs: &G) -> LocalRegisterCopy<u32, COMMAND::Register> {
    LocalRegisterCopy::new(regs.read_command())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockOs, MockRegisters, TraceEvent};

    #[test]
    fn irq_success_reads_payload_one() {
        let regs = MockRegisters::new();
        let os = MockOs::new();
        let port = os.create_message_port(4).unwrap();
        os.deliver_irq(port, 1);
        assert_eq!(wait_for_completion(&os, &regs, port, true), Ok(()));
        assert!(regs.trace().is_empty());
    }

    #[test]
    fn irq_bad_payload_triggers_recovery_and_hardware_sync() {
        let regs = MockRegisters::new();
        let os = MockOs::new();
        let port = os.create_message_port(4).unwrap();
        os.deliver_irq(port, 2);
        let result = wait_for_completion(&os, &regs, port, true);
        assert_eq!(result, Err(NandError::HardwareSync));
        assert!(matches!(regs.trace().as_slice(), [TraceEvent::WriteCommand(_)]));
    }

    #[test]
    fn irq_receive_failure_triggers_recovery() {
        let regs = MockRegisters::new();
        let os = MockOs::new();
        let port = os.create_message_port(4).unwrap();
        os.fail_next_receive();
        let result = wait_for_completion(&os, &regs, port, true);
        assert_eq!(result, Err(NandError::HardwareSync));
    }

    #[test]
    fn poll_path_waits_for_execute_to_clear() {
        let regs = MockRegisters::new();
        let os = MockOs::new();
        let port = PortId(0);
        regs.poke_command(0); // execute already clear, has_error clear
        assert_eq!(wait_for_completion(&os, &regs, port, false), Ok(()));
    }

    #[test]
    fn has_error_escalates_to_command_failed_and_recovers() {
        let regs = MockRegisters::new();
        let os = MockOs::new();
        let port = os.create_message_port(4).unwrap();
        os.deliver_irq(port, 1);
        regs.poke_command(1 << 2); // HAS_ERROR bit set
        let result = wait_for_completion(&os, &regs, port, true);
        assert_eq!(result, Err(NandError::CommandFailed));
        let trace = regs.trace();
        assert_eq!(trace.len(), 1);
        match trace[0] {
            TraceEvent::WriteCommand(word) => {
                let word: LocalRegisterCopy<u32, COMMAND::Register> = LocalRegisterCopy::new(word);
                assert_eq!(word.read(COMMAND::OPCODE), 0xFF);
                assert_eq!(word.read(COMMAND::WAIT), 1);
                assert_eq!(word.read(COMMAND::EXECUTE), 1);
            }
            _ => panic!("expected a command write"),
        }
    }
}
