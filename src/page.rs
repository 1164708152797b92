//! Page-granular read/write/erase state machines: addressing, cache
//! maintenance, command submission, and (for reads) ECC correction.

use crate::command::CommandFlags;
use crate::ecc;
use crate::errorlog::Category;
use crate::hal::{AhbBridge, HostOs};
use crate::registers::RegisterGateway;
use crate::session::NandDriver;
use crate::{NandError, Result};

/// Whether a page read also wants the hardware-computed ECC validated
/// (and single-bit errors corrected) against the stored ECC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEccMode {
    DataOnly,
    DataAndEcc,
}

impl<O: HostOs, G: RegisterGateway> NandDriver<O, G> {
    fn require_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(NandError::NotReady)
        }
    }

    fn require_valid_page(&self, page_number: u32) -> Result<&'static crate::catalog::ChipProfile> {
        let profile = self.profile().ok_or(NandError::NotReady)?;
        if page_number >= profile.geometry.page_count() {
            return Err(NandError::InvalidArgument);
        }
        Ok(profile)
    }

    /// Reads one page, per `SPEC_FULL.md` §4.4.1.
    ///
    /// `data_out` must be exactly `profile.geometry.page_size()` bytes.
    /// `ecc_out`, if present, receives a copy of the ECC region. In
    /// [`ReadEccMode::DataAndEcc`], the hardware-computed ECC is compared
    /// against the stored ECC and single-bit errors in `data_out` are
    /// corrected in place; the correction outcome becomes this call's
    /// return value.
    pub fn read_page(
        &mut self,
        page_number: u32,
        data_out: &mut [u8],
        mut ecc_out: Option<&mut [u8]>,
        mode: ReadEccMode,
    ) -> Result<()> {
        self.require_initialized()?;
        let profile = self.require_valid_page(page_number)?;
        if data_out.len() != profile.geometry.page_size() {
            return Err(NandError::InvalidArgument);
        }

        let result = self.read_page_inner(page_number, data_out, &mut ecc_out, mode, profile);
        let log_page = page_number >> (0x0E - profile.geometry.page_size_shift);
        self.record(log_page, Category::Read, result.err().map_or(0, |e| e.code()));
        result
    }

    fn read_page_inner(
        &mut self,
        page_number: u32,
        data_out: &mut [u8],
        ecc_out: &mut Option<&mut [u8]>,
        mode: ReadEccMode,
        profile: &'static crate::catalog::ChipProfile,
    ) -> Result<()> {
        let page_size = profile.geometry.page_size();
        let ecc_size = profile.geometry.ecc_region_size();
        let spare_size = 4usize << (profile.geometry.page_size_shift - 9);

        self.set_nand_address(Some(0), Some(page_number));

        let input_address = if profile.opcodes.read_prefix != crate::catalog::UNDEFINED_OPCODE {
            self.send_raw_command(profile.opcodes.read_prefix, profile.opcodes.input_address, CommandFlags::empty(), 0)?;
            0
        } else {
            profile.opcodes.input_address
        };

        let want_ecc = mode == ReadEccMode::DataAndEcc;
        if want_ecc {
            let data_va = data_out.as_ptr() as usize;
            let ecc_va = self.ecc_scratch.address();
            self.set_nand_data(Some(data_va), Some(ecc_va));
            self.os().dcache_invalidate(data_va, page_size);
            self.os().dcache_invalidate(ecc_va, ecc_size);
            let aux_va = self.aux_scratch.address();
            self.os().dcache_invalidate(aux_va, spare_size);
        } else {
            let read_va = self.read_scratch.address();
            self.set_nand_data(Some(read_va), None);
            self.os().dcache_invalidate(read_va, page_size + ecc_size);
        }

        let mut flags = CommandFlags::GENERATE_IRQ | CommandFlags::WAIT | CommandFlags::READ_DATA;
        if want_ecc {
            flags |= CommandFlags::CALCULATE_ECC;
        }
        self.send_raw_command(profile.opcodes.read, input_address, flags, page_size as u16)?;

        self.os().ahb_flush_from(AhbBridge::Nand);
        self.os().ahb_flush_to(AhbBridge::Starlet);

        if !want_ecc {
            if let Some(ecc_dest) = ecc_out.as_deref_mut() {
                ecc_dest[..ecc_size].copy_from_slice(&self.read_scratch[page_size..page_size + ecc_size]);
            }
            data_out.copy_from_slice(&self.read_scratch[..page_size]);
            Ok(())
        } else {
            if let Some(ecc_dest) = ecc_out.as_deref_mut() {
                ecc_dest[..ecc_size].copy_from_slice(&self.ecc_scratch[..ecc_size]);
            }
            let ecc_region: [u8; 64] = {
                let mut region = [0u8; 64];
                region.copy_from_slice(&self.ecc_scratch[..]);
                region
            };
            let result =
                ecc::correct(data_out, &ecc_region, profile.geometry.page_size_shift, profile.geometry.ecc_size_shift);
            #[cfg(feature = "log")]
            if let Err(NandError::Uncorrectable) = result {
                log::error!("NAND: page {page_number} has an uncorrectable ECC error");
            }
            result
        }
    }

    /// Reads the controller status byte, per `SPEC_FULL.md` §4.4.2. A set
    /// top bit in the status byte is reported as [`NandError::Uncorrectable`],
    /// matching the original's `IPC_EUNKN` (the filesystem layer's
    /// "unknown hardware condition" return) being the closest driver-level
    /// kind this crate exposes for that case.
    pub fn read_status(&mut self) -> Result<()> {
        self.require_initialized()?;
        let profile = self.profile().ok_or(NandError::NotReady)?;

        let id_va = self.id_scratch.address();
        self.os().dcache_invalidate(id_va, self.id_scratch.len());
        self.set_nand_data(Some(id_va), None);
        self.send_raw_command(profile.opcodes.read_status_prefix, 0, CommandFlags::READ_DATA, 0x40)?;

        self.os().ahb_flush_from(AhbBridge::Nand);
        self.os().ahb_flush_to(AhbBridge::Starlet);

        if (self.id_scratch[0] as i8) < 0 {
            #[cfg(feature = "log")]
            log::error!("NAND: status byte {:#04x} reports an uncorrectable condition", self.id_scratch[0]);
            Err(NandError::Uncorrectable)
        } else {
            Ok(())
        }
    }

    /// Writes one page, per `SPEC_FULL.md` §4.4.3: `write_prefix`
    /// followed by the data transfer followed by `write`.
    pub fn write_page(&mut self, page_number: u32, data: &[u8], ecc: Option<&[u8]>) -> Result<()> {
        self.require_initialized()?;
        let profile = self.require_valid_page(page_number)?;
        if data.len() != profile.geometry.page_size() {
            return Err(NandError::InvalidArgument);
        }

        let result = self.write_page_inner(page_number, data, ecc, profile);
        let log_page = page_number >> (0x0E - profile.geometry.page_size_shift);
        self.record(log_page, Category::Unknown3, result.err().map_or(0, |e| e.code()));
        result
    }

    fn write_page_inner(
        &mut self,
        page_number: u32,
        data: &[u8],
        ecc: Option<&[u8]>,
        profile: &'static crate::catalog::ChipProfile,
    ) -> Result<()> {
        let page_size = profile.geometry.page_size();
        let ecc_size = profile.geometry.ecc_region_size();

        self.set_nand_address(Some(0), Some(page_number));

        if profile.opcodes.write_prefix != crate::catalog::UNDEFINED_OPCODE {
            self.send_raw_command(profile.opcodes.write_prefix, profile.opcodes.input_address, CommandFlags::empty(), 0)?;
        }

        self.write_scratch[..page_size].copy_from_slice(data);
        if let Some(ecc_bytes) = ecc {
            self.write_scratch[page_size..page_size + ecc_size].copy_from_slice(ecc_bytes);
        }

        let write_va = self.write_scratch.address();
        self.set_nand_data(Some(write_va), None);
        self.os().dcache_flush(write_va, page_size + ecc_size);

        self.send_raw_command(
            profile.opcodes.write,
            profile.opcodes.input_address,
            CommandFlags::GENERATE_IRQ | CommandFlags::WAIT | CommandFlags::WRITE_DATA,
            page_size as u16,
        )?;

        self.os().ahb_flush_to(AhbBridge::Nand);
        Ok(())
    }

    /// Erases one block, per `SPEC_FULL.md` §4.4.3: `erase_prefix`
    /// followed by `erase`.
    pub fn erase_block(&mut self, page_number: u32) -> Result<()> {
        self.require_initialized()?;
        let profile = self.require_valid_page(page_number)?;

        let result = self.erase_block_inner(page_number, profile);
        let log_page = page_number >> (0x0E - profile.geometry.page_size_shift);
        self.record(log_page, Category::Erase, result.err().map_or(0, |e| e.code()));
        result
    }

    fn erase_block_inner(&self, page_number: u32, profile: &'static crate::catalog::ChipProfile) -> Result<()> {
        self.set_nand_address(None, Some(page_number));
        if profile.opcodes.erase_prefix != crate::catalog::UNDEFINED_OPCODE {
            self.send_raw_command(profile.opcodes.erase_prefix, 0, CommandFlags::empty(), 0)?;
        }
        self.send_raw_command(profile.opcodes.erase, 0, CommandFlags::GENERATE_IRQ | CommandFlags::WAIT, 0)
    }
}
