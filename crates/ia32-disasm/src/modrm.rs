//! ModR/M and SIB decoding.
//!
//! The inverse of `ia32_core::encode_modrm`: the displacement width read here
//! is stored on the memory operand, so re-encoding reproduces the same
//! addressing bytes.

use crate::cursor::{ByteCursor, Fault};
use crate::prefix::Prefixes;
use ia32_core::{Immediate, Memory, ModRm, OperandSize, Register, RegisterClass, Sib};

/// Decode a memory operand whose ModR/M byte has already been read.
///
/// Must not be called for register forms (mod=3).
pub(crate) fn decode_memory(
    cursor: &mut ByteCursor<'_>,
    modrm: ModRm,
    size: OperandSize,
    prefixes: &Prefixes,
) -> Result<Memory, Fault> {
    debug_assert!(!modrm.is_register());
    if prefixes.address_size {
        log::debug!("16-bit addressing form (modrm {:#04x})", modrm.to_byte());
        return Err(Fault::Unknown);
    }

    let mut base = None;
    let mut index = None;
    let mut scale = 1;
    let mut disp32 = modrm.has_disp32();

    if modrm.needs_sib() {
        let sib = Sib::from_byte(cursor.read_u8()?);
        if sib.index != Sib::NO_INDEX {
            index = Some(Register::from_field(RegisterClass::Gpr32, sib.index));
            scale = sib.scale_factor();
        }
        if modrm.mod_ == 0 && sib.base == Sib::NO_BASE {
            disp32 = true;
        } else {
            base = Some(Register::from_field(RegisterClass::Gpr32, sib.base));
        }
    } else if !(modrm.mod_ == 0 && modrm.rm == 0b101) {
        base = Some(Register::from_field(RegisterClass::Gpr32, modrm.rm));
    }

    let displacement = if modrm.has_disp8() {
        Some(Immediate::signed_byte(cursor.read_i8()?))
    } else if disp32 {
        Some(Immediate::dword(cursor.read_u32()?))
    } else {
        None
    };

    Ok(Memory {
        base,
        index,
        scale,
        displacement,
        size,
        segment: prefixes.segment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(bytes: &[u8]) -> Result<(Memory, usize), Fault> {
        let mut cursor = ByteCursor::new(bytes);
        let modrm = ModRm::from_byte(cursor.read_u8()?);
        let mem = decode_memory(&mut cursor, modrm, OperandSize::Dword, &Prefixes::default())?;
        Ok((mem, cursor.position()))
    }

    #[test]
    fn test_base_only() {
        let (mem, len) = memory(&[0x03]).unwrap();
        assert_eq!(mem.base, Some(Register::EBX));
        assert_eq!(mem.displacement, None);
        assert_eq!(len, 1);
    }

    #[test]
    fn test_disp32_only() {
        let (mem, len) = memory(&[0x05, 0x00, 0x20, 0x40, 0x00]).unwrap();
        assert!(mem.is_absolute());
        assert_eq!(mem.disp(), 0x402000);
        assert_eq!(len, 5);
    }

    #[test]
    fn test_ebp_disp8_zero() {
        let (mem, _) = memory(&[0x45, 0x00]).unwrap();
        assert_eq!(mem.base, Some(Register::EBP));
        assert_eq!(mem.displacement, Some(Immediate::signed_byte(0)));
    }

    #[test]
    fn test_sib_forms() {
        // [eax+ecx*4+0x10]
        let (mem, len) = memory(&[0x44, 0x88, 0x10]).unwrap();
        assert_eq!(mem.base, Some(Register::EAX));
        assert_eq!(mem.index, Some(Register::ECX));
        assert_eq!(mem.scale, 4);
        assert_eq!(mem.disp(), 0x10);
        assert_eq!(len, 3);

        // [esp]
        let (mem, _) = memory(&[0x04, 0x24]).unwrap();
        assert_eq!(mem.base, Some(Register::ESP));
        assert_eq!(mem.index, None);

        // [ecx*8+0x100], no base
        let (mem, len) = memory(&[0x04, 0xCD, 0x00, 0x01, 0x00, 0x00]).unwrap();
        assert_eq!(mem.base, None);
        assert_eq!(mem.index, Some(Register::ECX));
        assert_eq!(mem.scale, 8);
        assert_eq!(mem.disp(), 0x100);
        assert_eq!(len, 6);
    }

    #[test]
    fn test_truncated_displacement() {
        assert_eq!(memory(&[0x80, 0x01]), Err(Fault::Truncated { needed: 5 }));
    }

    #[test]
    fn test_address_size_override() {
        let prefixes = Prefixes {
            address_size: true,
            ..Prefixes::default()
        };
        let mut cursor = ByteCursor::new(&[0x00]);
        let modrm = ModRm::from_byte(0x00);
        assert_eq!(
            decode_memory(&mut cursor, modrm, OperandSize::Byte, &prefixes),
            Err(Fault::Unknown)
        );
    }
}
