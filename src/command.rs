//! Assembles and submits the 32-bit NAND command word.

use bitflags::bitflags;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::LocalRegisterCopy;

use crate::catalog::UNDEFINED_OPCODE;
use crate::registers::{CommandWord, RegisterGateway, COMMAND};

bitflags! {
    /// The boolean bits of a command submission, independent of the
    /// always-on `execute` bit and the read-only `has_error` status bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandFlags: u8 {
        const WAIT          = 0b0000_0001;
        const GENERATE_IRQ  = 0b0000_0010;
        const CALCULATE_ECC = 0b0000_0100;
        const READ_DATA     = 0b0000_1000;
        const WRITE_DATA    = 0b0001_0000;
    }
}

/// Composes the 32-bit command word. `addr5` and `data_len` are masked
/// to their field widths; `execute` is always set.
pub fn compose_command_word(opcode: u8, addr5: u8, flags: CommandFlags, data_len: u16) -> CommandWord {
    let mut word: CommandWord = LocalRegisterCopy::new(0);
    word.write(
        COMMAND::EXECUTE.val(1)
            + COMMAND::ADDRESS.val((addr5 & 0x1F) as u32)
            + COMMAND::OPCODE.val(opcode as u32)
            + COMMAND::DATA_LENGTH.val((data_len & 0x0FFF) as u32)
            + COMMAND::WAIT.val(flags.contains(CommandFlags::WAIT) as u32)
            + COMMAND::GENERATE_IRQ.val(flags.contains(CommandFlags::GENERATE_IRQ) as u32)
            + COMMAND::CALCULATE_ECC.val(flags.contains(CommandFlags::CALCULATE_ECC) as u32)
            + COMMAND::READ_DATA.val(flags.contains(CommandFlags::READ_DATA) as u32)
            + COMMAND::WRITE_DATA.val(flags.contains(CommandFlags::WRITE_DATA) as u32),
    );
    word
}

/// Submits `opcode` with the given address, flags, and data length.
///
/// Returns `Err(InvalidArgument)` without touching the hardware if
/// `opcode` is [`UNDEFINED_OPCODE`] (`0xFE`), per the opcode guard in
/// `SPEC_FULL.md` §4.3/P4.
pub fn send_command<G: RegisterGateway>(
    regs: &G,
    opcode: u8,
    addr5: u8,
    flags: CommandFlags,
    data_len: u16,
) -> Result<(), crate::NandError> {
    if opcode == UNDEFINED_OPCODE {
        return Err(crate::NandError::InvalidArgument);
    }
    let word = compose_command_word(opcode, addr5, flags, data_len);
    regs.write_command(word.get());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockRegisters;

    #[test]
    fn compose_sets_execute_and_fields() {
        let word = compose_command_word(0x30, 0x1D, CommandFlags::WAIT | CommandFlags::READ_DATA, 0x800);
        assert_eq!(word.read(COMMAND::EXECUTE), 1);
        assert_eq!(word.read(COMMAND::OPCODE), 0x30);
        assert_eq!(word.read(COMMAND::ADDRESS), 0x1D);
        assert_eq!(word.read(COMMAND::WAIT), 1);
        assert_eq!(word.read(COMMAND::READ_DATA), 1);
        assert_eq!(word.read(COMMAND::GENERATE_IRQ), 0);
        assert_eq!(word.read(COMMAND::DATA_LENGTH), 0x800);
    }

    #[test]
    fn masks_oversized_address_and_length() {
        let word = compose_command_word(0x30, 0xFF, CommandFlags::empty(), 0xFFFF);
        assert_eq!(word.read(COMMAND::ADDRESS), 0x1F);
        assert_eq!(word.read(COMMAND::DATA_LENGTH), 0x0FFF);
    }

    #[test]
    fn undefined_opcode_is_rejected_without_touching_hardware() {
        let regs = MockRegisters::new();
        let result = send_command(&regs, UNDEFINED_OPCODE, 0, CommandFlags::empty(), 0);
        assert_eq!(result, Err(crate::NandError::InvalidArgument));
        assert!(regs.trace().is_empty());
    }

    #[test]
    fn defined_opcode_writes_the_command_register() {
        let regs = MockRegisters::new();
        send_command(&regs, 0x90, 1, CommandFlags::READ_DATA, 0x40).unwrap();
        assert_eq!(regs.read_command() & 0xFF00, 0x9000);
    }
}
