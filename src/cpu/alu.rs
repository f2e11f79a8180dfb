//! Arithmetic logic unit.
//!
//! All arithmetic is on 8-bit registers and wraps modulo 256.

use crate::cpu::decode::Opcode;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Operations the ALU can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Mul,
}

impl AluOp {
    /// Apply the operation to two register values.
    #[inline]
    pub fn apply(self, a: u8, b: u8) -> u8 {
        match self {
            AluOp::Add => a.wrapping_add(b),
            AluOp::Mul => a.wrapping_mul(b),
        }
    }
}

impl TryFrom<u8> for AluOp {
    type Error = AluError;

    fn try_from(opcode: u8) -> Result<Self, Self::Error> {
        match opcode {
            Opcode::ADD => Ok(AluOp::Add),
            Opcode::MUL => Ok(AluOp::Mul),
            other => Err(AluError::UnsupportedOperation(other)),
        }
    }
}

/// Errors raised by the ALU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AluError {
    #[error("unsupported ALU operation: {0:#010b}")]
    UnsupportedOperation(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add_wraps() {
        assert_eq!(AluOp::Add.apply(200, 100), 44);
        assert_eq!(AluOp::Add.apply(255, 1), 0);
    }

    #[test]
    fn test_mul_wraps() {
        assert_eq!(AluOp::Mul.apply(9, 3), 27);
        assert_eq!(AluOp::Mul.apply(16, 16), 0);
        assert_eq!(AluOp::Mul.apply(255, 255), 1);
    }

    #[test]
    fn test_from_opcode() {
        assert_eq!(AluOp::try_from(Opcode::ADD), Ok(AluOp::Add));
        assert_eq!(AluOp::try_from(Opcode::MUL), Ok(AluOp::Mul));
        assert_eq!(
            AluOp::try_from(Opcode::LDI),
            Err(AluError::UnsupportedOperation(Opcode::LDI))
        );
    }

    proptest! {
        #[test]
        fn add_is_sum_mod_256(a in any::<u8>(), b in any::<u8>()) {
            prop_assert_eq!(AluOp::Add.apply(a, b) as u32, (a as u32 + b as u32) % 256);
        }

        #[test]
        fn mul_is_product_mod_256(a in any::<u8>(), b in any::<u8>()) {
            prop_assert_eq!(AluOp::Mul.apply(a, b) as u32, (a as u32 * b as u32) % 256);
        }
    }
}
